use ems_tsdb::TdengineColumn;
use ems_tsdb::query::{
    ColumnOptions, LatestQuery, SeriesQuery, column_type_for, create_database, create_stable,
    duration_literal, latest_query, quote_columns, quote_literals, select_columns, series_query,
};
use std::time::Duration;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn quote_columns_with_and_without_function() {
    let columns = strings(&["p1", "p2"]);
    assert_eq!(quote_columns(&columns, None), "`p1`, `p2`");
    assert_eq!(
        quote_columns(&columns, Some("last")),
        "last(`p1`) as `p1`, last(`p2`) as `p2`"
    );
    assert_eq!(quote_literals(&strings(&["d1", "d2"])), "'d1', 'd2'");
}

#[test]
fn select_columns_prepends_alias_columns() {
    let columns = select_columns(
        &strings(&["p1"]),
        ColumnOptions {
            function: None,
            with_timestamp: true,
            with_device: true,
            with_project: true,
        },
    );
    assert_eq!(
        columns,
        "`_ts`, `device` as `deviceId`, `project` as `projectId`, `p1`"
    );
}

#[test]
fn latest_query_with_device_filter() {
    let device_ids = strings(&["d1", "d2"]);
    let point_codes = strings(&["p1", "p2"]);
    let sql = latest_query(&LatestQuery {
        model: "meter",
        device_ids: &device_ids,
        point_codes: &point_codes,
        real_time_window: "1m",
        with_timestamp: true,
        with_device: true,
        with_project: false,
    });
    assert_eq!(
        sql,
        "SELECT last(`_ts`) as `_ts`, `device` as `deviceId`, last(`p1`) as `p1`, last(`p2`) as `p2` \
         FROM `meter` WHERE `device` IN ('d1', 'd2') AND `_ts`>NOW-1m PARTITION BY `device`"
    );
}

#[test]
fn latest_query_without_devices_omits_in_clause() {
    let point_codes = strings(&["p1"]);
    let sql = latest_query(&LatestQuery {
        model: "meter",
        device_ids: &[],
        point_codes: &point_codes,
        real_time_window: "90s",
        with_timestamp: false,
        with_device: false,
        with_project: false,
    });
    assert_eq!(
        sql,
        "SELECT last(`p1`) as `p1` FROM `meter` WHERE `_ts`>NOW-90s PARTITION BY `device`"
    );
}

#[test]
fn series_query_uses_millisecond_bounds() {
    let point_codes = strings(&["p1", "p2"]);
    let sql = series_query(&SeriesQuery {
        model: "meter",
        device_id: "d1",
        point_codes: &point_codes,
        start_ms: 1_000,
        end_ms: 61_000,
        interval: "1m",
        fill: "NULL",
    });
    assert_eq!(
        sql,
        "SELECT _wstart, last(`p1`) as `p1`, last(`p2`) as `p2` FROM `meter` \
         WHERE `device`='d1' AND `_ts` >= 1000 AND `_ts` <= 61000 INTERVAL(1m) FILL(NULL)"
    );
}

#[test]
fn ddl_statements() {
    assert_eq!(
        create_database("ems", "24h"),
        "CREATE DATABASE `ems` BUFFER 48 PAGES 128 DURATION 6h KEEP 24h"
    );
    let columns = vec![
        TdengineColumn::new("p1", "1"),
        TdengineColumn::new("p2", "12"),
        TdengineColumn::new("p3", "13"),
        TdengineColumn::new("p4", "99"),
    ];
    assert_eq!(
        create_stable("meter", &columns),
        "CREATE STABLE IF NOT EXISTS `meter` (`_ts` TIMESTAMP, `p1` DOUBLE, `p2` BOOL, `p3` NCHAR(32), `p4` DOUBLE) \
         TAGS (`device` NCHAR(16), `project` NCHAR(16))"
    );
    assert_eq!(
        create_stable("empty", &[]),
        "CREATE STABLE IF NOT EXISTS `empty` (`_ts` TIMESTAMP) TAGS (`device` NCHAR(16), `project` NCHAR(16))"
    );
}

#[test]
fn column_types_by_data_type_code() {
    for code in ["1", "5", "11"] {
        assert_eq!(column_type_for(code), "DOUBLE");
    }
    assert_eq!(column_type_for("12"), "BOOL");
    assert_eq!(column_type_for("13"), "NCHAR(32)");
    assert_eq!(column_type_for(""), "DOUBLE");
}

#[test]
fn duration_literal_rewrites_compound_terms() {
    assert_eq!(duration_literal("15m", Duration::from_secs(900)), "15m");
    assert_eq!(duration_literal("1m30s", Duration::from_secs(90)), "90s");
    assert_eq!(duration_literal("1500ms", Duration::from_millis(1500)), "1500a");
}
