use std::env;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

use glob::glob;
use toml::Value;
use rustc_version::version;

fn main() {
  let out_dir = env::var("OUT_DIR").unwrap();
  let dest_path = Path::new(&out_dir).join("all.toml");
  let mut out = File::create(dest_path).unwrap();

  println!("cargo:rerun-if-changed=data/cameras");

  let mut paths: Vec<_> = glob("./data/cameras/*/**/*.toml")
    .expect("Failed to read glob pattern")
    .map(|entry| entry.unwrap())
    .collect();
  // Catalog lookups are first-match, keep the joined file stable across filesystems
  paths.sort();

  for path in paths {
    println!("cargo:rerun-if-changed={}", path.display());
    let mut f = File::open(path.clone()).unwrap();
    let mut toml = String::new();
    f.read_to_string(&mut toml).unwrap();
    if let Err(e) = toml.parse::<Value>() {
      panic!("Error parsing {:?}: {:?}", path, e);
    }
    out.write_all(b"[[cameras]]\n").unwrap();
    out.write_all(&toml.into_bytes()).unwrap();
    out.write_all(b"\n").unwrap();
  }

  let rustc = version().unwrap();
  println!("cargo:rustc-env=THREEFR_RUSTC_VERSION={}", rustc);
}
