use std::cell::RefCell;
use std::rc::Rc;

use clap::Parser;
use clap::ValueEnum;
use fish_table::Diagnostic;
use fish_table::TailTable;
use fish_table::tail_table::InsertBehavior;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Pattern {
    /// 0, 1, 2, ...
    Sequential,
    /// Uniformly random keys from a fixed seed
    Random,
    /// Multiples of the stride
    Strided,
    /// Keys sharing the top bits, which crowd few home buckets
    Clustered,
}

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'c', long = "target_capacity", default_value_t = 1000)]
    target_capacity: usize,

    #[arg(short = 'p', long = "pattern", value_enum, default_value_t = Pattern::Random)]
    pattern: Pattern,

    #[arg(short = 'l', long = "load_factor", default_value_t = 0.5)]
    load_factor: f32,

    #[arg(short = 's', long = "stride", default_value_t = 1024)]
    stride: i32,

    #[arg(long = "seed", default_value_t = 0x5eed)]
    seed: u64,
}

fn key_at(pattern: Pattern, index: usize, stride: i32, rng: &mut SmallRng) -> i32 {
    match pattern {
        Pattern::Sequential => index as i32,
        Pattern::Random => rng.random(),
        Pattern::Strided => (index as i32).wrapping_mul(stride),
        Pattern::Clustered => (index as i32) << 20,
    }
}

fn main() {
    let args = Args::parse();

    println!(
        "Creating TailTable with target capacity: {}",
        args.target_capacity
    );

    let mut table: TailTable<u64> = TailTable::with_capacity(args.target_capacity);
    if let Err(err) = table.set_max_load_factor(args.load_factor) {
        eprintln!("{err}");
        std::process::exit(2);
    }

    let diagnostics = Rc::new(RefCell::new(Vec::<Diagnostic>::new()));
    let sink = Rc::clone(&diagnostics);
    table.on_diagnostic(move |d| sink.borrow_mut().push(d.clone()));

    let initial_capacity = table.capacity();
    let num_values = (initial_capacity as f64 * f64::from(args.load_factor)) as usize;
    println!("Actual capacity: {initial_capacity}");
    println!("Filling table with {num_values} {:?} keys...", args.pattern);

    let mut rng = SmallRng::seed_from_u64(args.seed);
    let mut duplicates = 0;
    for i in 0..num_values {
        let key = key_at(args.pattern, i, args.stride, &mut rng);
        if table
            .insert(key, i as u64, InsertBehavior::Reject)
            .is_err()
        {
            duplicates += 1;
        }
    }

    println!("Inserted {} values into table", table.len());
    println!(
        "Final load factor: {:.2}% ({} buckets)",
        (table.len() as f64 / table.capacity() as f64) * 100.0,
        table.capacity()
    );
    if table.capacity() != initial_capacity {
        println!(
            "Table grew from {initial_capacity} to {} buckets because of collisions",
            table.capacity()
        );
    }

    table.print_chain_histogram();
    table.debug_stats().print();
    println!("Duplicate keys skipped: {duplicates}");

    let diagnostics = diagnostics.borrow();
    println!("Diagnostics: {}", diagnostics.len());
    for diagnostic in diagnostics.iter().take(10) {
        println!("  {diagnostic}");
    }

    if let Err(err) = table.validate() {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
