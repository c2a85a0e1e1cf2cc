//! Writes a deterministic sample order table as CSV or Parquet. The default
//! row count sits above the worker threshold so the background path gets
//! exercised.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{BooleanArray, Date32Array, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Days, NaiveDate};
use clap::{Parser, ValueEnum};
use parquet::arrow::ArrowWriter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Parquet,
}

#[derive(Debug, Parser)]
#[command(about = "Generate a sample spreadsheet for sheetlens")]
struct Args {
    /// Number of data rows
    #[arg(long, default_value_t = 12_000)]
    rows: usize,

    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Output file; defaults to sample_orders.<format>
    #[arg(long)]
    output: Option<PathBuf>,

    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5)).rotate_left(7).wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn below(&mut self, n: usize) -> usize {
        (self.next_u64() % n as u64) as usize
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.below(items.len())]
    }
}

struct Order {
    id: i64,
    region: &'static str,
    product: &'static str,
    quantity: i64,
    unit_price: f64,
    ordered: NaiveDate,
    shipped: bool,
    note: Option<&'static str>,
}

const REGIONS: &[&str] = &["North", "South", "East", "West"];
const PRODUCTS: &[&str] = &["Widget", "Gadget", "Gizmo", "Doohickey", "Sprocket"];
const NOTES: &[&str] = &["rush", "gift wrap", "backorder", "call first"];

fn generate(rows: usize, rng: &mut SimpleRng) -> Result<Vec<Order>> {
    let start = NaiveDate::from_ymd_opt(2023, 1, 1).context("invalid start date")?;
    (0..rows)
        .map(|i| {
            let ordered = start
                .checked_add_days(Days::new(rng.below(730) as u64))
                .context("date out of range")?;
            Ok(Order {
                id: i as i64 + 1,
                region: rng.pick(REGIONS),
                product: rng.pick(PRODUCTS),
                quantity: 1 + rng.below(50) as i64,
                unit_price: (rng.next_f64() * 200.0 * 100.0).round() / 100.0,
                ordered,
                shipped: rng.next_f64() < 0.8,
                // most orders carry no note
                note: (rng.next_f64() < 0.15).then(|| rng.pick(NOTES)),
            })
        })
        .collect()
}

const HEADERS: [&str; 8] = [
    "order_id",
    "region",
    "product",
    "quantity",
    "unit_price",
    "order_date",
    "shipped",
    "note",
];

fn write_csv(orders: &[Order], path: &Path) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("creating {}", path.display()))?;
    writer.write_record(HEADERS)?;
    for o in orders {
        writer.write_record([
            o.id.to_string(),
            o.region.to_string(),
            o.product.to_string(),
            o.quantity.to_string(),
            format!("{:.2}", o.unit_price),
            o.ordered.format("%Y-%m-%d").to_string(),
            o.shipped.to_string(),
            o.note.unwrap_or_default().to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(orders: &[Order], path: &Path) -> Result<()> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).context("invalid epoch")?;

    let schema = Arc::new(Schema::new(vec![
        Field::new(HEADERS[0], DataType::Int64, false),
        Field::new(HEADERS[1], DataType::Utf8, false),
        Field::new(HEADERS[2], DataType::Utf8, false),
        Field::new(HEADERS[3], DataType::Int64, false),
        Field::new(HEADERS[4], DataType::Float64, false),
        Field::new(HEADERS[5], DataType::Date32, false),
        Field::new(HEADERS[6], DataType::Boolean, false),
        Field::new(HEADERS[7], DataType::Utf8, true),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(Int64Array::from_iter_values(orders.iter().map(|o| o.id))),
            Arc::new(StringArray::from_iter_values(orders.iter().map(|o| o.region))),
            Arc::new(StringArray::from_iter_values(orders.iter().map(|o| o.product))),
            Arc::new(Int64Array::from_iter_values(orders.iter().map(|o| o.quantity))),
            Arc::new(Float64Array::from_iter_values(orders.iter().map(|o| o.unit_price))),
            Arc::new(Date32Array::from_iter_values(
                orders
                    .iter()
                    .map(|o| (o.ordered - epoch).num_days() as i32),
            )),
            Arc::new(BooleanArray::from(
                orders.iter().map(|o| o.shipped).collect::<Vec<_>>(),
            )),
            Arc::new(StringArray::from(
                orders.iter().map(|o| o.note).collect::<Vec<_>>(),
            )),
        ],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut rng = SimpleRng::new(args.seed);
    let orders = generate(args.rows, &mut rng)?;

    let output = args.output.unwrap_or_else(|| {
        PathBuf::from(match args.format {
            Format::Csv => "sample_orders.csv",
            Format::Parquet => "sample_orders.parquet",
        })
    });
    match args.format {
        Format::Csv => write_csv(&orders, &output)?,
        Format::Parquet => write_parquet(&orders, &output)?,
    }

    println!("Wrote {} orders to {}", orders.len(), output.display());
    Ok(())
}
