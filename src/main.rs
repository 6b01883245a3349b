use std::process::ExitCode;

fn main() -> ExitCode {
    match facewatch_lib::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("facewatch: {e}");
            ExitCode::FAILURE
        }
    }
}
