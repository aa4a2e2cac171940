use std::env;
use std::fs::File;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

fn usage() {
  println!("benchmark <file>");
  std::process::exit(1);
}

static ITERATIONS: u32 = 50;

fn error(err: &dyn std::fmt::Display) {
  println!("ERROR: {}", err);
  std::process::exit(2);
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  let args: Vec<_> = env::args().collect();
  if args.len() != 2 {
    usage();
  }
  let file = &args[1];
  println!("Loading file \"{}\" (built with rustc {})", file, env!("THREEFR_RUSTC_VERSION"));

  let mut f = match File::open(file) {
    Ok(val) => val,
    Err(e) => {
      error(&e);
      return
    },
  };
  let buffer = match threefr::Buffer::new(&mut f) {
    Ok(val) => val,
    Err(e) => {
      error(&e);
      return
    },
  };
  let rawhide = threefr::RawHide::new();
  let from_time = Instant::now();
  for _ in 0..ITERATIONS {
    let decoder = match rawhide.get_decoder(&buffer) {
      Ok(val) => val,
      Err(e) => {
        error(&e);
        return
      },
    };
    if let Err(e) = decoder.image() {
      error(&e);
    }
  }
  let elapsed = from_time.elapsed();

  let avgtime = elapsed.as_secs_f64() * 1000.0 / ITERATIONS as f64;
  println!("Average decode time: {:.3} ms ({} iterations)", avgtime, ITERATIONS);
}
