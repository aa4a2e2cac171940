use std::env;
use std::fs::File;

use rayon::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

use threefr::{RawError, RawImage, RawMetadata};

fn usage() {
  println!("identify [--metadata] <file>...");
  std::process::exit(1);
}

enum Report {
  Image(RawImage),
  Metadata(RawMetadata),
}

fn identify(file: &str, metadata_only: bool) -> Result<Report, RawError> {
  if metadata_only {
    let mut f = File::open(file)?;
    Ok(Report::Metadata(threefr::decode_metadata(&mut f)?))
  } else {
    Ok(Report::Image(threefr::decode_file(file)?))
  }
}

fn describe(meta: &RawMetadata) -> String {
  format!(
    "  make: {} ({})\n  model: {} ({})\n  cfa: {}\n  wb_coeffs: {:?}\n  blacklevels: {:?}\n  whitelevels: {:?}\n  crops: {:?}\n",
    meta.make, meta.clean_make, meta.model, meta.clean_model, meta.cfa,
    meta.wb_coeffs, meta.blacklevels, meta.whitelevels, meta.crops,
  )
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  let mut args: Vec<String> = env::args().skip(1).collect();
  let metadata_only = args.first().map_or(false, |a| a == "--metadata");
  if metadata_only {
    args.remove(0);
  }
  if args.is_empty() {
    usage();
  }

  threefr::force_initialization();
  info!("Identifying {} files", args.len());

  let reports: Vec<String> = args.par_iter().map(|file| {
    match identify(file, metadata_only) {
      Ok(Report::Image(image)) => {
        let mut out = format!("{}: {}x{}\n", file, image.width, image.height);
        out.push_str(&describe(&image.metadata));
        for err in &image.errors {
          out.push_str(&format!("  partial: {}\n", err));
        }
        out
      },
      Ok(Report::Metadata(meta)) => format!("{}:\n{}", file, describe(&meta)),
      Err(e) => format!("{}: ERROR: {}\n", file, e),
    }
  }).collect();

  for report in reports {
    print!("{}", report);
  }
}
