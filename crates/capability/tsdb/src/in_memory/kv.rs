//! 键值命令内存实现
//!
//! 仅用于本地测试和演示，覆盖 `RedisClient` 用到的哈希、Stream、过期与 SCAN 语义。
//! 过期键在下一次访问时清理。

use crate::error::TsdbError;
use crate::redis::KvCommandClient;
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// SCAN 每页数量
const PAGE_SIZE: usize = 10;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct StreamId {
    millis: i64,
    sequence: u64,
}

impl StreamId {
    fn render(&self) -> String {
        format!("{}-{}", self.millis, self.sequence)
    }
}

#[derive(Debug, Clone)]
struct StreamEntry {
    id: StreamId,
    field: String,
    value: String,
}

#[derive(Debug, Clone)]
enum Entry {
    Hash(HashMap<String, String>),
    Stream(Vec<StreamEntry>),
}

impl Entry {
    fn type_name(&self) -> &'static str {
        match self {
            Entry::Hash(_) => "hash",
            Entry::Stream(_) => "stream",
        }
    }
}

#[derive(Debug, Clone)]
struct Slot {
    entry: Entry,
    expires_at: Option<Instant>,
}

impl Slot {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// 内存键值存储
pub struct InMemoryKvStore {
    slots: RwLock<BTreeMap<String, Slot>>,
    healthy: AtomicBool,
}

impl Default for InMemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryKvStore {
    pub fn new() -> Self {
        Self {
            slots: RwLock::new(BTreeMap::new()),
            healthy: AtomicBool::new(true),
        }
    }

    /// 模拟服务不可用，PING 返回错误（用于测试）
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// 未过期键数量（用于测试）
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.slots
            .read()
            .map(|slots| slots.values().filter(|slot| !slot.is_expired(now)).count())
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stream 条目数量，键不存在为 0（用于测试）
    pub fn stream_len(&self, key: &str) -> usize {
        let now = Instant::now();
        let Ok(slots) = self.slots.read() else {
            return 0;
        };
        match slots.get(key) {
            Some(slot) if !slot.is_expired(now) => match &slot.entry {
                Entry::Stream(entries) => entries.len(),
                Entry::Hash(_) => 0,
            },
            _ => 0,
        }
    }

    /// 剩余存活时间，未设置过期返回 None（用于测试）
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        let slots = self.slots.read().ok()?;
        let deadline = slots.get(key)?.expires_at?;
        Some(deadline.saturating_duration_since(now))
    }

    fn write_slots(
        &self,
    ) -> Result<std::sync::RwLockWriteGuard<'_, BTreeMap<String, Slot>>, TsdbError> {
        let mut slots = self.slots.write().map_err(|_| TsdbError::Lock)?;
        let now = Instant::now();
        slots.retain(|_, slot| !slot.is_expired(now));
        Ok(slots)
    }
}

fn wrong_type() -> TsdbError {
    TsdbError::Transport(WRONG_TYPE.to_string())
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn parse_millis(text: &str) -> Result<i64, TsdbError> {
    text.parse::<i64>()
        .map_err(|_| TsdbError::Transport(format!("ERR Invalid stream ID specified: {}", text)))
}

/// 解析范围边界，只有毫秒部分时按 `low` 决定序号取最小或最大。
fn parse_bound(text: &str, low: bool) -> Result<StreamId, TsdbError> {
    match text {
        "-" => Ok(StreamId {
            millis: i64::MIN,
            sequence: 0,
        }),
        "+" => Ok(StreamId {
            millis: i64::MAX,
            sequence: u64::MAX,
        }),
        _ => match text.split_once('-') {
            Some((millis, sequence)) => Ok(StreamId {
                millis: parse_millis(millis)?,
                sequence: sequence.parse::<u64>().map_err(|_| {
                    TsdbError::Transport(format!("ERR Invalid stream ID specified: {}", text))
                })?,
            }),
            None => Ok(StreamId {
                millis: parse_millis(text)?,
                sequence: if low { 0 } else { u64::MAX },
            }),
        },
    }
}

/// 计算 XADD 的实际 ID，必须大于当前最后一条。
fn next_stream_id(requested: &str, last: Option<StreamId>) -> Result<StreamId, TsdbError> {
    let auto_sequence = |millis: i64| match last {
        Some(last) if last.millis == millis => last.sequence + 1,
        _ => 0,
    };
    let id = match requested {
        "*" => {
            let millis = now_millis().max(last.map(|last| last.millis).unwrap_or(i64::MIN));
            StreamId {
                millis,
                sequence: auto_sequence(millis),
            }
        }
        _ => match requested.split_once('-') {
            Some((millis, "*")) => {
                let millis = parse_millis(millis)?;
                StreamId {
                    millis,
                    sequence: auto_sequence(millis),
                }
            }
            _ => parse_bound(requested, true)?,
        },
    };
    if last.is_some_and(|last| id <= last) {
        return Err(TsdbError::Transport(
            "ERR The ID specified in XADD is equal or smaller than the target stream top item"
                .to_string(),
        ));
    }
    Ok(id)
}

/// 仅支持 `*` 通配的 glob 匹配。
fn glob_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let (first, rest) = (parts[0], &parts[1..]);
    let Some(mut remaining) = text.strip_prefix(first) else {
        return false;
    };
    let (last, middle) = match rest.split_last() {
        Some(split) => split,
        None => return true,
    };
    for part in middle {
        match remaining.find(part) {
            Some(index) => remaining = &remaining[index + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last)
}

#[async_trait::async_trait]
impl KvCommandClient for InMemoryKvStore {
    async fn ping(&self) -> Result<(), TsdbError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TsdbError::Transport("connection refused".to_string()))
        }
    }

    async fn hset_multiple(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), TsdbError> {
        let mut slots = self.write_slots()?;
        let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
            entry: Entry::Hash(HashMap::new()),
            expires_at: None,
        });
        let Entry::Hash(hash) = &mut slot.entry else {
            return Err(wrong_type());
        };
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>, TsdbError> {
        let slots = self.write_slots()?;
        match slots.get(key).map(|slot| &slot.entry) {
            Some(Entry::Hash(hash)) => Ok(hash.clone()),
            Some(Entry::Stream(_)) => Err(wrong_type()),
            None => Ok(HashMap::new()),
        }
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), TsdbError> {
        let mut slots = self.write_slots()?;
        if let Some(slot) = slots.get_mut(key) {
            slot.expires_at = Some(Instant::now() + Duration::from_secs(seconds));
        }
        Ok(())
    }

    async fn xadd(
        &self,
        key: &str,
        id: &str,
        field: &str,
        value: &str,
    ) -> Result<String, TsdbError> {
        let mut slots = self.write_slots()?;
        let slot = slots.entry(key.to_string()).or_insert_with(|| Slot {
            entry: Entry::Stream(Vec::new()),
            expires_at: None,
        });
        let Entry::Stream(entries) = &mut slot.entry else {
            return Err(wrong_type());
        };
        let id = next_stream_id(id, entries.last().map(|entry| entry.id))?;
        entries.push(StreamEntry {
            id,
            field: field.to_string(),
            value: value.to_string(),
        });
        Ok(id.render())
    }

    async fn xrange(&self, key: &str, start: &str, end: &str) -> Result<Vec<Value>, TsdbError> {
        let start = parse_bound(start, true)?;
        let end = parse_bound(end, false)?;
        let slots = self.write_slots()?;
        let entries = match slots.get(key).map(|slot| &slot.entry) {
            Some(Entry::Stream(entries)) => entries,
            Some(Entry::Hash(_)) => return Err(wrong_type()),
            None => return Ok(Vec::new()),
        };
        Ok(entries
            .iter()
            .filter(|entry| entry.id >= start && entry.id <= end)
            .map(|entry| json!([entry.id.render(), [entry.field, entry.value]]))
            .collect())
    }

    async fn xtrim_minid(&self, key: &str, min_id: &str) -> Result<u64, TsdbError> {
        let min_id = parse_bound(min_id, true)?;
        let mut slots = self.write_slots()?;
        let entries = match slots.get_mut(key).map(|slot| &mut slot.entry) {
            Some(Entry::Stream(entries)) => entries,
            Some(Entry::Hash(_)) => return Err(wrong_type()),
            None => return Ok(0),
        };
        let before = entries.len();
        entries.retain(|entry| entry.id >= min_id);
        Ok((before - entries.len()) as u64)
    }

    async fn scan(
        &self,
        cursor: u64,
        pattern: Option<&str>,
        key_type: Option<&str>,
    ) -> Result<(u64, Vec<String>), TsdbError> {
        let slots = self.write_slots()?;
        let offset = usize::try_from(cursor).unwrap_or(usize::MAX);
        let page: Vec<(&String, &Slot)> = slots.iter().skip(offset).take(PAGE_SIZE).collect();
        let next_offset = offset.saturating_add(page.len());
        let next_cursor = if page.len() < PAGE_SIZE || next_offset >= slots.len() {
            0
        } else {
            next_offset as u64
        };
        let keys = page
            .into_iter()
            .filter(|(key, _)| pattern.is_none_or(|pattern| glob_match(pattern, key)))
            .filter(|(_, slot)| key_type.is_none_or(|key_type| slot.entry.type_name() == key_type))
            .map(|(key, _)| key.clone())
            .collect();
        Ok((next_cursor, keys))
    }
}
