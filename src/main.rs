fn main() {
    if let Err(err) = survey_profiler::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
