//! Writes a deterministic bank-marketing style CSV for trying out the CLI.
//!
//! Usage: `generate_sample [OUTPUT] [ROWS]` (defaults: `bank-sample.csv`, 1000).

const JOBS: &[&str] = &[
    "admin.",
    "blue-collar",
    "entrepreneur",
    "housemaid",
    "management",
    "retired",
    "self-employed",
    "services",
    "student",
    "technician",
    "unemployed",
    "unknown",
];
const MARITAL: &[&str] = &["divorced", "married", "single", "unknown"];
const YES_NO: &[&str] = &["no", "unknown", "yes"];
const CONTACT: &[&str] = &["cellular", "telephone"];
const MONTHS: &[&str] = &["apr", "aug", "dec", "jul", "jun", "mar", "may", "nov", "oct", "sep"];
const DAYS: &[&str] = &["fri", "mon", "thu", "tue", "wed"];

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

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }

    fn pick<'a>(&mut self, options: &[&'a str]) -> &'a str {
        options[(self.next_u64() % options.len() as u64) as usize]
    }
}

fn main() {
    let mut args = std::env::args().skip(1);
    let output_path = args.next().unwrap_or_else(|| "bank-sample.csv".to_string());
    let rows: usize = args
        .next()
        .map(|n| n.parse().expect("ROWS must be a positive integer"))
        .unwrap_or(1000);

    let mut rng = SimpleRng::new(42);
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b';')
        .from_path(&output_path)
        .expect("Failed to create output file");

    writer
        .write_record([
            "age",
            "job",
            "marital",
            "default",
            "housing",
            "loan",
            "contact",
            "month",
            "day_of_week",
            "duration",
            "y",
        ])
        .expect("Failed to write header");

    let mut subscribed = 0usize;
    for _ in 0..rows {
        let age = rng.gauss(40.0, 10.0).round().clamp(18.0, 95.0) as u32;
        let job = if age >= 62 { "retired" } else { rng.pick(JOBS) };
        let duration = (rng.next_f64() * 1200.0).round() as u32;

        // Longer calls and older clients subscribe more often.
        let p_yes = 0.03 + duration as f64 / 2400.0 + if age >= 60 { 0.15 } else { 0.0 };
        let y = if rng.next_f64() < p_yes { "yes" } else { "no" };
        if y == "yes" {
            subscribed += 1;
        }

        let age = age.to_string();
        let duration = duration.to_string();
        let marital = rng.pick(MARITAL);
        let default = rng.pick(&YES_NO[..2]);
        let housing = rng.pick(YES_NO);
        let loan = rng.pick(YES_NO);
        let contact = rng.pick(CONTACT);
        let month = rng.pick(MONTHS);
        let day = rng.pick(DAYS);
        writer
            .write_record([
                age.as_str(),
                job,
                marital,
                default,
                housing,
                loan,
                contact,
                month,
                day,
                duration.as_str(),
                y,
            ])
            .expect("Failed to write row");
    }
    writer.flush().expect("Failed to flush output");

    println!("Wrote {rows} clients ({subscribed} subscribed) to {output_path}");
}
