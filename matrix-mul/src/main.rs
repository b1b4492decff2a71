use clap::Parser;
use matrix_mul::{MatrixMul, random_matrix};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Sends random matrices to a strassen-server and prints their product.
#[derive(Debug, Parser)]
#[command(name = "matrix-mul", version)]
struct Args {
    /// Server address.
    #[arg(default_value = "localhost:5556")]
    addr: String,

    /// Side length of each matrix (a power of two).
    #[arg(default_value_t = 8)]
    size: usize,

    /// Number of matrices in the chain.
    #[arg(default_value_t = 2)]
    count: usize,

    /// Seed for reproducible matrices.
    #[arg(long)]
    seed: Option<u64>,

    /// Print the input matrices too.
    #[arg(long)]
    show_inputs: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let matrices: Vec<_> = (0..args.count)
        .map(|_| random_matrix(args.size, &mut rng))
        .collect();
    tracing::info!(count = args.count, size = args.size, "generated matrices");

    if args.show_inputs {
        for (i, m) in matrices.iter().enumerate() {
            println!("Matrix {}:", i);
            print!("{}", m);
        }
    }

    println!("Connecting to {}...", args.addr);
    let mm = MatrixMul::connect(args.addr.as_str()).await?;
    let result = mm.multiply_chain(&matrices).await?;

    println!("Result ({}x{}):", result.size(), result.size());
    print!("{}", result);

    Ok(())
}
