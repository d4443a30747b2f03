use spanmetrics::{
    build_view, create_span_metrics, CompileError, DdlOptions, IdentityResolver, Instrument,
    MetricDefinition, SpansIndexResolver, SqlScript, ViewDefinition,
};

fn metric(instrument: &str) -> MetricDefinition {
    MetricDefinition {
        name: "uptrace.tracing.spans".to_string(),
        description: "Spans duration".to_string(),
        unit: "microseconds".to_string(),
        instrument: instrument.to_string(),
        value: "span.duration / 1000".to_string(),
        ..Default::default()
    }
}

fn aliases(view: &ViewDefinition) -> Vec<Option<&str>> {
    view.select_columns
        .iter()
        .map(|c| c.alias.as_deref())
        .collect()
}

#[test]
fn test_base_columns() {
    let view = build_view(&metric("gauge"), &SpansIndexResolver).unwrap();

    assert_eq!(view.view_name, "metrics_uptrace_tracing_spans_mv");
    assert_eq!(view.metric, "uptrace.tracing.spans");
    assert_eq!(view.instrument, Instrument::Gauge);
    assert_eq!(
        view.select_sql(),
        "s.project_id, 'uptrace.tracing.spans' AS metric, toStartOfMinute(s.time) AS time, \
         'gauge' AS instrument, s.duration / 1000 AS value"
    );
    assert_eq!(view.group_by, vec!["s.project_id, toStartOfMinute(s.time)"]);
    assert_eq!(view.filter, None);
}

#[test]
fn test_instrument_shapes() {
    let value = "s.duration / 1000";

    for instrument in ["gauge", "additive"] {
        let view = build_view(&metric(instrument), &SpansIndexResolver).unwrap();
        assert_eq!(view.column("value").unwrap().expr, value);
        assert_eq!(view.select_columns.len(), 5);
    }

    let view = build_view(&metric("additive"), &SpansIndexResolver).unwrap();
    assert_eq!(view.instrument, Instrument::Additive);
    assert_eq!(view.column("instrument").unwrap().expr, "'additive'");

    let view = build_view(&metric("counter"), &SpansIndexResolver).unwrap();
    assert_eq!(view.column("sum").unwrap().expr, value);
    assert!(view.column("value").is_none());

    let view = build_view(&metric("histogram"), &SpansIndexResolver).unwrap();
    assert_eq!(
        &aliases(&view)[4..],
        &[Some("count"), Some("sum"), Some("histogram")]
    );
    assert_eq!(view.column("count").unwrap().expr, "count()");
    assert_eq!(view.column("sum").unwrap().expr, "sum(s.duration / 1000)");
    assert_eq!(
        view.column("histogram").unwrap().expr,
        "quantilesBFloat16State(0.5)(toFloat32(s.duration / 1000))"
    );
}

#[test]
fn test_bogus_instrument() {
    for instrument in ["bogus", "Gauge", "summary"] {
        assert_eq!(
            build_view(&metric(instrument), &SpansIndexResolver),
            Err(CompileError::UnsupportedInstrument(instrument.to_string()))
        );
    }
}

#[test]
fn test_bogus_instrument_is_reported_before_value_errors() {
    let mut m = metric("bogus");
    m.value = "'not a number'".to_string();
    assert_eq!(
        build_view(&m, &SpansIndexResolver),
        Err(CompileError::UnsupportedInstrument("bogus".to_string()))
    );
}

#[test]
fn test_missing_fields() {
    let mut m = metric("gauge");
    m.name = String::new();
    assert!(matches!(
        build_view(&m, &SpansIndexResolver),
        Err(CompileError::InvalidMetricConfig(_))
    ));

    let m = metric("");
    assert!(matches!(
        build_view(&m, &SpansIndexResolver),
        Err(CompileError::InvalidMetricConfig(_))
    ));
}

#[test]
fn test_attrs_keep_order() {
    let mut m = metric("histogram");
    m.attrs = vec![
        "span.system".to_string(),
        "service.name".to_string(),
        "http.route".to_string(),
    ];
    let view = build_view(&m, &SpansIndexResolver).unwrap();

    let attrs = "s.system, s.service_name, s.attr_values[indexOf(s.attr_keys, 'http.route')]";
    assert_eq!(
        view.group_by,
        vec![
            "s.project_id, toStartOfMinute(s.time)".to_string(),
            attrs.to_string(),
        ]
    );
    assert_eq!(
        view.column("attrs_hash").unwrap().expr,
        format!("xxHash64(arrayStringConcat([{}], '-'))", attrs)
    );
    assert_eq!(
        view.column("attr_keys").unwrap().expr,
        "['span.system', 'service.name', 'http.route']"
    );
    assert_eq!(view.column("attr_values").unwrap().expr, format!("[{}]", attrs));
    assert_eq!(
        &aliases(&view)[4..7],
        &[Some("attrs_hash"), Some("attr_keys"), Some("attr_values")]
    );
}

#[test]
fn test_filter() {
    let mut m = metric("counter");
    m.filter = Some("span.system = 'http:api' or not span.kind = 'internal'".to_string());
    let view = build_view(&m, &SpansIndexResolver).unwrap();
    assert_eq!(
        view.filter.as_deref(),
        Some("s.system = 'http:api' OR NOT s.kind = 'internal'")
    );

    // always-true conditions leave no filter behind
    m.filter = Some("where span.name exists".to_string());
    let view = build_view(&m, &SpansIndexResolver).unwrap();
    assert_eq!(view.filter, None);
}

#[test]
fn test_aggregate_in_filter() {
    for filter in [
        "span.count > 1",
        "span.system = 'db' and p99(span.duration) > 1s",
        "span.system = 'db' or span.kind = 'client' or not span.error_rate > 0.5",
    ] {
        let mut m = metric("gauge");
        m.filter = Some(filter.to_string());
        assert!(
            matches!(
                build_view(&m, &SpansIndexResolver),
                Err(CompileError::AggregateInFilter(_))
            ),
            "filter: {}",
            filter
        );
    }
}

#[test]
fn test_malformed_filter() {
    let mut m = metric("gauge");
    m.filter = Some("a = 1 | b".to_string());
    assert_eq!(
        build_view(&m, &IdentityResolver),
        Err(CompileError::MalformedFilter("a = 1 | b".to_string()))
    );
}

#[test]
fn test_idempotent() {
    let mut m = metric("histogram");
    m.attrs = vec!["span.system".to_string()];
    m.annotations = vec!["span.name".to_string()];
    m.filter = Some("span.duration > 10ms".to_string());

    let first = build_view(&m, &SpansIndexResolver).unwrap();
    let second = build_view(&m, &SpansIndexResolver).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_number_and_parens_verbatim() {
    let mut m = metric("gauge");
    m.value = "((span.duration)) * 3.14".to_string();
    let view = build_view(&m, &IdentityResolver).unwrap();
    assert_eq!(view.column("value").unwrap().expr, "((span.duration)) * 3.14");
}

#[test]
fn test_view_serializes() {
    let view = build_view(&metric("counter"), &SpansIndexResolver).unwrap();
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["view_name"], "metrics_uptrace_tracing_spans_mv");
    assert_eq!(json["instrument"], "counter");
    assert_eq!(json["select_columns"][0]["alias"], serde_json::Value::Null);
    assert_eq!(json["filter"], serde_json::Value::Null);
}

#[test]
fn test_script() {
    let mut m = metric("counter");
    m.filter = Some("span.system = 'http:api'".to_string());

    let mut script = SqlScript::new(DdlOptions {
        cluster: Some("uptrace1".to_string()),
        ..Default::default()
    });
    create_span_metrics(&[m], &[1, 2], &SpansIndexResolver, &mut script).unwrap();

    assert_eq!(script.records().len(), 2);
    assert_eq!(script.records()[0].unit, "microseconds");

    let expected = "DROP VIEW IF EXISTS metrics_uptrace_tracing_spans_mv ON CLUSTER uptrace1;\n\
        \n\
        CREATE MATERIALIZED VIEW metrics_uptrace_tracing_spans_mv ON CLUSTER uptrace1\n\
        TO measure_minutes AS\n\
        SELECT s.project_id, 'uptrace.tracing.spans' AS metric, toStartOfMinute(s.time) AS time, \
        'counter' AS instrument, s.duration / 1000 AS sum\n\
        FROM spans_index AS s\n\
        WHERE s.system = 'http:api'\n\
        GROUP BY s.project_id, toStartOfMinute(s.time);";
    assert_eq!(script.into_sql(), expected);
}
