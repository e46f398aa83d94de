use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use clap::Parser;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::{Map, Value};

const CROCKFORD: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

const LAST_NAMES: [&str; 10] = [
    "Smith", "Johnson", "Williams", "Brown", "Jones", "Miller", "Davis", "Garcia", "Rodriguez",
    "Wilson",
];
const FIRST_NAMES: [&str; 10] = [
    "James",
    "Mary",
    "Robert",
    "Patricia",
    "John",
    "Jennifer",
    "Michael",
    "Linda",
    "William",
    "Elizabeth",
];
const PREFECTURES: [&str; 47] = [
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県", "茨城県", "栃木県",
    "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県", "新潟県", "富山県", "石川県", "福井県",
    "山梨県", "長野県", "岐阜県", "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府",
    "兵庫県", "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県", "徳島県",
    "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県", "熊本県", "大分県", "宮崎県",
    "鹿児島県", "沖縄県",
];
const HOBBIES: [&str; 7] = [
    "reading", "traveling", "cooking", "sports", "music", "gaming", "art",
];
const STYLES: [&str; 5] = ["casual", "formal", "sporty", "elegant", "vintage"];
const MUSIC: [&str; 6] = ["rock", "pop", "jazz", "classical", "hiphop", "electronic"];
const BOOKS: [&str; 5] = [
    "1984",
    "Pride and Prejudice",
    "To Kill a Mockingbird",
    "The Great Gatsby",
    "Moby Dick",
];

/// Generate a sample CSV with a JSON `other` column
#[derive(Parser, Debug)]
struct Args {
    /// Number of rows to generate
    #[arg(short = 'n', long, default_value_t = 500, value_parser = clap::value_parser!(u64).range(1..))]
    rows: u64,

    /// Output file path
    #[arg(short, long)]
    output: PathBuf,
}

fn encode_base32(mut value: u128, len: usize) -> String {
    let mut out = vec![b'0'; len];
    for slot in out.iter_mut().rev() {
        *slot = CROCKFORD[(value & 0x1F) as usize];
        value >>= 5;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn ulid(rng: &mut impl Rng) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
        & ((1 << 48) - 1);
    let random: u128 = rng.random::<u128>() & ((1 << 80) - 1);
    encode_base32(millis, 10) + &encode_base32(random, 16)
}

fn pick<'a>(rng: &mut impl Rng, values: &[&'a str]) -> &'a str {
    values.choose(rng).copied().unwrap_or_default()
}

fn other_json(rng: &mut impl Rng) -> String {
    let mut other = Map::new();
    for (key, probability, values) in [
        ("hobby", 0.7, &HOBBIES[..]),
        ("style", 0.5, &STYLES[..]),
        ("favorite_music", 0.6, &MUSIC[..]),
        ("favorite_book", 0.4, &BOOKS[..]),
    ] {
        if rng.random_bool(probability) {
            other.insert(key.to_string(), Value::from(pick(rng, values)));
        }
    }
    Value::Object(other).to_string()
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut writer = csv::Writer::from_path(&args.output)
        .with_context(|| format!("Cannot create {}", args.output.display()))?;

    writer.write_record([
        "ID",
        "last_name",
        "first_name",
        "age",
        "gender",
        "address",
        "email",
        "other",
    ])?;

    let mut rng = rand::rng();
    for _ in 0..args.rows {
        let last = pick(&mut rng, &LAST_NAMES);
        let first = pick(&mut rng, &FIRST_NAMES);
        let email = format!(
            "{}.{}{}@example.com",
            first.to_lowercase(),
            last.to_lowercase(),
            rng.random_range(1..=1000)
        );

        writer.write_record([
            ulid(&mut rng),
            last.to_string(),
            first.to_string(),
            rng.random_range(0..=60).to_string(),
            pick(&mut rng, &["男", "女"]).to_string(),
            pick(&mut rng, &PREFECTURES).to_string(),
            email,
            other_json(&mut rng),
        ])?;
    }
    writer.flush()?;

    println!("Generated {} rows -> {}", args.rows, args.output.display());
    Ok(())
}
