use filter_mirror_rs as fmr;

fn main() {
    let opts = fmr::opts::parse_args();
    if let Err(err) = fmr::run(&opts) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}
