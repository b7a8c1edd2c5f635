fn main() {
    if let Err(err) = survey_workbench::run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}
