//! Thin CLI entry point. All behavior lives in [`pegrat::runner`].

fn main() {
    env_logger::init();
    match pegrat::runner::run(std::env::args()) {
        Ok(output) => print!("{output}"),
        Err(e) => panic!("{e}"),
    }
}
