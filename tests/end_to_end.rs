use std::fmt::Write as _;
use std::io::Write as _;
use std::sync::Arc;

use arrow::array::{Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

use sheetlens::data::filter::{
    FilterOperator, FilterStateEntry, FilterUpdate, FilterValues, RangeMode, RangeValues,
    SearchValues, numeric_bins,
};
use sheetlens::data::lint::IssueLevel;
use sheetlens::data::model::{CellValue, ColumnStatistics, ColumnType};
use sheetlens::{
    ExcelData, FilterConfig, FilterEngine, IngestConfig, ParseOptions, Session, parse_bytes,
    validate_data,
};

const ORDERS: &str = "\
id,customer,amount,shipped,placed
1,A,10,true,2024-01-01
2,B,25.5,false,2024-01-15
3,C,40,true,2024-02-01
4,A,55,TRUE,2024-02-20
5,C,,false,2024-03-05
,,,,
,,,,
";

fn parse_csv(text: &str) -> ExcelData {
    parse_bytes("orders.csv", text.as_bytes(), &ParseOptions::default(), &IngestConfig::default())
        .expect("csv parses")
}

fn ids(rows: &[&Vec<CellValue>]) -> Vec<String> {
    rows.iter().map(|r| r[0].to_string()).collect()
}

#[test]
fn csv_is_typed_and_trimmed() {
    let data = parse_csv(ORDERS);
    assert_eq!(data.headers, vec!["id", "customer", "amount", "shipped", "placed"]);
    assert_eq!(data.metadata.total_rows, 5);
    assert_eq!(data.metadata.total_columns, 5);

    let amount = data.column("amount").unwrap();
    assert_eq!(amount.column_type, ColumnType::Number);
    assert_eq!(amount.null_count, 1);
    match &amount.statistics {
        Some(ColumnStatistics::Numeric { min, max, .. }) => {
            assert_eq!((*min, *max), (10.0, 55.0));
        }
        other => panic!("unexpected statistics {other:?}"),
    }

    assert_eq!(data.column("shipped").unwrap().column_type, ColumnType::Boolean);
    assert_eq!(data.column("placed").unwrap().column_type, ColumnType::Date);
    assert_eq!(data.column("customer").unwrap().unique_count, 3);
}

#[test]
fn select_on_a_and_c_keeps_order() {
    let data = parse_csv(ORDERS);
    let customer = data.column("customer").unwrap();
    let mut filter = FilterConfig::for_column(customer);
    let FilterValues::Select(options) = &mut filter.values else {
        panic!("customer should get a select filter");
    };
    for option in options.iter_mut() {
        option.selected = matches!(option.value.to_string().as_str(), "A" | "C");
    }
    filter.active = true;

    let engine = FilterEngine::new([filter]);
    assert_eq!(ids(&engine.apply_filters(&data)), vec!["1", "3", "4", "5"]);
}

#[test]
fn default_filters_pass_everything_until_activated() {
    let data = parse_csv(ORDERS);
    let mut engine = FilterEngine::for_data(&data);
    assert_eq!(engine.apply_filters(&data).len(), data.len());

    // activating the untouched amount range drops only the blank amount
    let amount_id = engine
        .filters()
        .into_iter()
        .find(|f| f.column == "amount")
        .map(|f| f.id)
        .unwrap();
    engine.update_filter(&amount_id, FilterUpdate::default().active(true));
    assert_eq!(ids(&engine.apply_filters(&data)), vec!["1", "2", "3", "4"]);
}

#[test]
fn mixed_filters_compose() {
    let data = parse_csv(ORDERS);
    let amount = FilterConfig {
        id: "amount".into(),
        display_name: "Amount".into(),
        column: "amount".into(),
        column_index: 2,
        active: true,
        operator: FilterOperator::GreaterThan,
        values: FilterValues::Range(RangeValues {
            min: 10.0,
            max: 55.0,
            current_min: 20.0,
            current_max: 55.0,
            mode: RangeMode::Continuous,
        }),
    };
    let shipped = FilterConfig {
        id: "shipped".into(),
        display_name: "Shipped".into(),
        column: "shipped".into(),
        column_index: 3,
        active: true,
        operator: FilterOperator::Equals,
        values: FilterValues::Boolean(Some(true)),
    };
    let engine = FilterEngine::new([amount, shipped]);
    assert_eq!(ids(&engine.apply_filters(&data)), vec!["3", "4"]);
}

#[test]
fn binned_ranges_from_generated_bins() {
    let data = parse_csv(ORDERS);
    let bins = numeric_bins(10.0, 55.0, 3);
    let top = bins[2].id.clone();
    let engine = FilterEngine::new([FilterConfig {
        id: "amount".into(),
        display_name: "Amount".into(),
        column: "amount".into(),
        column_index: 2,
        active: true,
        operator: FilterOperator::Equals,
        values: FilterValues::Range(RangeValues {
            min: 10.0,
            max: 55.0,
            current_min: 10.0,
            current_max: 55.0,
            mode: RangeMode::Binned {
                ranges: bins,
                selected_range_ids: vec![top],
            },
        }),
    }]);
    assert_eq!(ids(&engine.apply_filters(&data)), vec!["3", "4"]);
}

#[test]
fn ragged_rows_get_synthesized_headers() {
    let data = parse_csv("name,\nx,1,extra\ny,2\n");
    assert_eq!(data.headers, vec!["name", "Column 2", "Column 3"]);
    assert_eq!(data.column("Column 3").unwrap().null_count, 1);

    let issues = validate_data(&data);
    assert!(issues
        .iter()
        .any(|i| i.level == IssueLevel::Info && i.message.contains("Column 2, Column 3")));
}

#[test]
fn duplicate_headers_are_flagged() {
    let data = parse_csv("Name,name\na,b\n");
    let issues = validate_data(&data);
    assert!(issues.iter().any(|i| i.level == IssueLevel::Warning));
}

#[test]
fn filter_state_survives_a_file() {
    let data = parse_csv(ORDERS);
    let mut session = Session::new(data.clone(), &IngestConfig::default());
    let customer = session.data.column("customer").unwrap();
    let customer_id = format!("{}-{}", customer.index, customer.name);
    assert!(session.toggle_select_value(&customer_id, &"B".into()));
    assert_eq!(session.visible_indices(), &[1]);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    let state = session.engine.export_filter_state();
    file.write_all(serde_json::to_string_pretty(&state).unwrap().as_bytes()).unwrap();

    let text = std::fs::read_to_string(file.path()).unwrap();
    let entries: Vec<FilterStateEntry> = serde_json::from_str(&text).unwrap();
    let mut restored = Session::new(data, &IngestConfig::default());
    assert_eq!(restored.import_state(&entries), entries.len());
    assert_eq!(restored.visible_indices(), session.visible_indices());
    assert_eq!(restored.engine.export_filter_state(), state);
}

#[test]
fn persisted_state_uses_the_documented_shape() {
    let json = r#"[
        {"id": "0-id", "active": true, "operator": "contains", "type": "search",
         "values": {"query": "3", "caseSensitive": false, "exactMatch": true}},
        {"id": "missing", "active": true, "operator": "is_null", "type": "null", "values": true}
    ]"#;
    let entries: Vec<FilterStateEntry> = serde_json::from_str(json).unwrap();
    assert_eq!(
        entries[0].values,
        FilterValues::Search(SearchValues {
            query: "3".into(),
            case_sensitive: false,
            exact_match: true,
        })
    );

    let data = parse_csv(ORDERS);
    let mut engine = FilterEngine::for_data(&data);
    assert_eq!(engine.import_filter_state(&entries), 1);
    assert_eq!(ids(&engine.apply_filters(&data)), vec!["3"]);
}

fn large_csv(rows: usize) -> String {
    let mut text = String::from("n,group,value\n");
    for i in 0..rows {
        writeln!(text, "{i},g{},{}", i % 7, (i * 13) % 1000).unwrap();
    }
    text
}

#[test]
fn worker_and_main_thread_agree_on_large_input() {
    let text = large_csv(12_000);
    let worker = IngestConfig {
        worker_threshold: 10_000,
        ..IngestConfig::default()
    };
    let main_thread = IngestConfig {
        enable_worker: false,
        chunk_size: 1_000,
        ..IngestConfig::default()
    };
    let a = parse_bytes("big.csv", text.as_bytes(), &ParseOptions::default(), &worker).unwrap();
    let b =
        parse_bytes("big.csv", text.as_bytes(), &ParseOptions::default(), &main_thread).unwrap();
    assert_eq!(a.len(), 12_000);
    assert_eq!(a, b);
    assert_eq!(a.column("group").unwrap().unique_count, 7);
}

#[test]
fn parquet_files_decode() {
    let schema = Arc::new(Schema::new(vec![
        Field::new("id", DataType::Int64, false),
        Field::new("label", DataType::Utf8, true),
        Field::new("score", DataType::Float64, false),
    ]));
    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from(vec![1, 2, 3])),
            Arc::new(StringArray::from(vec![Some("x"), None, Some("z")])),
            Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5])),
        ],
    )
    .unwrap();
    let mut bytes = Vec::new();
    let mut writer = ArrowWriter::try_new(&mut bytes, schema, None).unwrap();
    writer.write(&batch).unwrap();
    writer.close().unwrap();

    let data = parse_bytes(
        "scores.parquet",
        &bytes,
        &ParseOptions::default(),
        &IngestConfig::default(),
    )
    .unwrap();
    assert_eq!(data.headers, vec!["id", "label", "score"]);
    assert_eq!(data.len(), 3);
    assert_eq!(data.rows[1][1], CellValue::Null);
    assert_eq!(data.column("score").unwrap().column_type, ColumnType::Number);

    let engine = FilterEngine::new([FilterConfig {
        id: "label".into(),
        display_name: "Label".into(),
        column: "label".into(),
        column_index: 1,
        active: true,
        operator: FilterOperator::IsNull,
        values: FilterValues::Null(true),
    }]);
    assert_eq!(ids(&engine.apply_filters(&data)), vec!["2"]);
}
