#[macro_use]
extern crate afl;

fn main() {
  threefr::force_initialization();

  fuzz_nohook!(|data: &[u8]| {
    // Remove the panic hook so we can actually catch panic
    std::panic::set_hook(Box::new(|_| {}));

    threefr::decode_metadata(&mut &data[..]).ok();
  });
}
