#[macro_use]
extern crate afl;

fn main() {
  threefr::force_initialization();

  fuzz_nohook!(|data: &[u8]| {
    threefr::decode_unwrapped(&mut &data[..]).ok();
  });
}
