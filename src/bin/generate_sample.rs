use std::sync::Arc;

use anyhow::{Context, Result};
use arrow::array::{ArrayRef, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;

const ROWS: usize = 600;

/// Header in export order; the first column is the unnamed index the
/// spreadsheet export writes.
const HEADER: [&str; 10] = [
    "Unnamed: 0",
    "Estado Real  1",
    "Estado Real  2",
    "prescriptor  HMLG",
    "regional_ips",
    "gender",
    "EPS1",
    "edad",
    "fecha_seguimiento",
    "observaciones",
];

const STATUS: [(&str, u32); 3] = [("Activo", 62), ("Inactivo", 30), ("Suspendido", 8)];
const STATUS_TYPE: [(&str, u32); 4] = [
    ("Con Barrera", 30),
    ("Sin Barrera", 45),
    ("En Proceso", 15),
    ("Fallecido", 10),
];
const REGIONS: [(&str, u32); 6] = [
    ("Antioquia", 30),
    ("Bogotá", 28),
    ("Valle", 15),
    ("Costa", 12),
    ("Eje Cafetero", 9),
    ("Santanderes", 6),
];
const GENDERS: [(&str, u32); 2] = [("Femenino", 55), ("Masculino", 45)];
const PAYERS: [(&str, u32); 7] = [
    ("Sura", 25),
    ("Sanitas", 20),
    ("Nueva EPS", 18),
    ("Compensar", 12),
    ("Famisanar", 10),
    ("Coosalud", 8),
    ("Salud Total", 7),
];
const NOTES: [&str; 4] = ["", "Llamada sin respuesta", "Paciente estable", "Pendiente autorización"];

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
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
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

    fn below(&mut self, n: u64) -> u64 {
        self.next_u64() % n
    }

    fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick one label according to its weight.
    fn weighted<'a>(&mut self, choices: &[(&'a str, u32)]) -> &'a str {
        let total: u32 = choices.iter().map(|&(_, w)| w).sum();
        let mut roll = self.below(u64::from(total)) as u32;
        for &(label, weight) in choices {
            if roll < weight {
                return label;
            }
            roll -= weight;
        }
        choices[choices.len() - 1].0
    }
}

/// Dirty a categorical value the way hand-kept exports do: stray padding,
/// blanks and the database's `[NULL]` marker.
fn messy(rng: &mut SimpleRng, value: &str) -> String {
    match rng.below(100) {
        0..=3 => String::new(),
        4..=6 => "[NULL]".to_string(),
        7..=11 => format!("  {value} "),
        _ => value.to_string(),
    }
}

fn categorical(rng: &mut SimpleRng, choices: &[(&str, u32)]) -> String {
    let value = rng.weighted(choices);
    messy(rng, value)
}

fn generate(rng: &mut SimpleRng) -> Vec<Vec<String>> {
    // 14 prescribers with a long tail, so the prescriber chart folds into "Other".
    let prescribers: Vec<(String, u32)> = (1..=14)
        .map(|i| (format!("Prescriptor {i:02}"), 30 / i + 1))
        .collect();
    let prescriber_refs: Vec<(&str, u32)> =
        prescribers.iter().map(|(name, w)| (name.as_str(), *w)).collect();

    (0..ROWS)
        .map(|i| {
            let month = 1 + rng.below(12);
            let day = 1 + rng.below(28);
            vec![
                i.to_string(),
                categorical(rng, &STATUS),
                categorical(rng, &STATUS_TYPE),
                categorical(rng, &prescriber_refs),
                categorical(rng, &REGIONS),
                categorical(rng, &GENDERS),
                categorical(rng, &PAYERS),
                (18 + rng.below(70)).to_string(),
                format!("2024-{month:02}-{day:02}"),
                NOTES[rng.below(NOTES.len() as u64) as usize].to_string(),
            ]
        })
        .collect()
}

fn write_csv(path: &str, rows: &[Vec<String>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path).with_context(|| format!("creating {path}"))?;
    writer.write_record(HEADER)?;
    for row in rows {
        writer.write_record(row)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_parquet(path: &str, rows: &[Vec<String>]) -> Result<()> {
    // Index and age are numeric; everything else is text, blanks become nulls.
    let numeric = [0, 7];
    let fields: Vec<Field> = HEADER
        .iter()
        .enumerate()
        .map(|(c, name)| {
            if numeric.contains(&c) {
                Field::new(*name, DataType::Int64, false)
            } else {
                Field::new(*name, DataType::Utf8, true)
            }
        })
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(HEADER.len());
    for c in 0..HEADER.len() {
        if numeric.contains(&c) {
            let values = rows
                .iter()
                .map(|row| row[c].parse::<i64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("column '{}' is not numeric", HEADER[c]))?;
            columns.push(Arc::new(Int64Array::from(values)));
        } else {
            let values: Vec<Option<&str>> = rows
                .iter()
                .map(|row| Some(row[c].as_str()).filter(|v| !v.is_empty()))
                .collect();
            columns.push(Arc::new(StringArray::from(values)));
        }
    }

    let batch = RecordBatch::try_new(schema.clone(), columns)?;
    let file = std::fs::File::create(path).with_context(|| format!("creating {path}"))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}

fn main() -> Result<()> {
    let mut rng = SimpleRng::new(42);
    let rows = generate(&mut rng);

    let csv_path = "sample_followups.csv";
    let parquet_path = "sample_followups.parquet";
    write_csv(csv_path, &rows)?;
    write_parquet(parquet_path, &rows)?;

    println!(
        "Wrote {} follow-ups ({} columns) to {csv_path} and {parquet_path}",
        rows.len(),
        HEADER.len()
    );
    Ok(())
}
