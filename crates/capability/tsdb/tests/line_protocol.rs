use chrono::{TimeZone, Utc};
use domain::Metric;
use ems_tsdb::line_protocol::serialize;

fn at_second(second: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(second, 0).single().expect("timestamp")
}

#[test]
fn serialize_sorted_tags_and_typed_fields() {
    let metric = Metric::new("meter", at_second(1))
        .with_tag("project", "p1")
        .with_tag("device", "d1")
        .with_field("ua", 1.5)
        .with_field("ub", 2i64)
        .with_field("on", true)
        .with_field("note", "a \"b\"");

    assert_eq!(
        serialize(&[metric]),
        "meter,device=d1,project=p1 ua=1.5,ub=2,on=true,note=\"a \\\"b\\\"\" 1000000000"
    );
}

#[test]
fn serialize_skips_metrics_without_tags_or_fields() {
    let no_tags = Metric::new("meter", at_second(1)).with_field("ua", 1i64);
    let no_fields = Metric::new("meter", at_second(1)).with_tag("device", "d1");
    let valid = Metric::new("meter", at_second(2))
        .with_tag("device", "d2")
        .with_field("ua", 3i64);

    assert_eq!(serialize(&[no_tags.clone(), no_fields.clone()]), "");
    assert_eq!(
        serialize(&[no_tags, valid, no_fields]),
        "meter,device=d2 ua=3 2000000000"
    );
}

#[test]
fn serialize_joins_lines_with_newline() {
    let first = Metric::new("meter", at_second(1))
        .with_tag("device", "d1")
        .with_field("ua", 1i64);
    let second = Metric::new("meter", at_second(2))
        .with_tag("device", "d2")
        .with_field("ua", 2i64);

    let output = serialize(&[first, second]);
    let lines: Vec<&str> = output.split('\n').collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "meter,device=d2 ua=2 2000000000");
}

#[test]
fn serialize_escapes_measurement_and_tags() {
    let metric = Metric::new("my meter", at_second(0))
        .with_tag("device", "a,b=c d")
        .with_field("u a", 1i64);

    assert_eq!(
        serialize(&[metric]),
        "my\\ meter,device=a\\,b\\=c\\ d u\\ a=1 0"
    );
}
