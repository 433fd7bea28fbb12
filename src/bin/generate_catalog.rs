use std::fmt::Write as _;
use std::sync::Arc;

use arrow::array::{Float64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

/// Ion labels as they appear in the catalog, with a typical log N range.
const IONS: [(&str, f64, f64); 4] = [
    ("SiII", 12.0, 14.5),
    ("SiIV", 12.0, 14.0),
    ("CIV", 12.5, 14.8),
    ("OVI", 13.0, 15.0),
];

struct Row {
    name: String,
    hi_col: f64,
    ion: &'static str,
    velocity: f64,
    col_dens: f64,
    doppler: f64,
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

    fn uniform(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }
}

/// Round to a fixed number of decimals so the ASCII and Parquet catalogs
/// carry identical values.
fn round_to(x: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (x * scale).round() / scale
}

fn main() {
    let mut rng = SimpleRng::new(42);
    let n_sightlines = 8;

    let mut rows = Vec::new();
    for i in 0..n_sightlines {
        let ra = 100 + rng.below(2300);
        let dec = rng.below(9000);
        let name = format!("J{ra:04}+{dec:04}");
        let hi_col = round_to(rng.uniform(17.2, 21.5), 2);

        for &(ion, lo, hi) in &IONS {
            // Some sightlines lack an ion entirely.
            let n_comp = rng.below(4);
            for _ in 0..n_comp {
                rows.push(Row {
                    name: name.clone(),
                    hi_col,
                    ion,
                    velocity: round_to(rng.uniform(-250.0, 250.0), 1),
                    col_dens: round_to(rng.uniform(lo, hi), 2),
                    doppler: round_to(rng.uniform(4.0, 40.0), 1),
                });
            }
        }

        // Guarantee every sightline appears in the catalog.
        if rows.last().map(|r| r.name != name).unwrap_or(true) {
            rows.push(Row {
                name,
                hi_col,
                ion: IONS[i % IONS.len()].0,
                velocity: 0.0,
                col_dens: 13.0,
                doppler: 10.0,
            });
        }
    }

    // Whitespace ASCII table
    let mut text = String::from("Name logN_HI Ion v_i log_N_i b_i\n");
    for r in &rows {
        writeln!(
            text,
            "{} {} {} {} {} {}",
            r.name, r.hi_col, r.ion, r.velocity, r.col_dens, r.doppler
        )
        .expect("formatting into a String cannot fail");
    }
    let ascii_path = "tab_fit_result.txt";
    std::fs::write(ascii_path, text).expect("Failed to write ASCII catalog");

    // Same rows as Parquet
    let schema = Arc::new(Schema::new(vec![
        Field::new("Name", DataType::Utf8, false),
        Field::new("logN_HI", DataType::Float64, false),
        Field::new("Ion", DataType::Utf8, false),
        Field::new("v_i", DataType::Float64, false),
        Field::new("log_N_i", DataType::Float64, false),
        Field::new("b_i", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![
            Arc::new(StringArray::from(
                rows.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(),
            )),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.hi_col).collect::<Vec<_>>())),
            Arc::new(StringArray::from(rows.iter().map(|r| r.ion).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.velocity).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.col_dens).collect::<Vec<_>>())),
            Arc::new(Float64Array::from(rows.iter().map(|r| r.doppler).collect::<Vec<_>>())),
        ],
    )
    .expect("Failed to create RecordBatch");

    let parquet_path = "tab_fit_result.parquet";
    let file = std::fs::File::create(parquet_path).expect("Failed to create output file");
    let mut writer = ArrowWriter::try_new(file, schema, None).expect("Failed to create writer");
    writer.write(&batch).expect("Failed to write batch");
    writer.close().expect("Failed to close writer");

    println!(
        "Wrote {} components on {n_sightlines} sightlines to {ascii_path} and {parquet_path}",
        rows.len()
    );
}
