#![forbid(unsafe_code)]

//! finegrain demo binary entry point.

use finegrain_demo::app::App;
use finegrain_demo::{cli, logging};

fn main() {
    let opts = cli::Opts::parse();
    logging::init(opts.log_format);

    let mut app = match App::new(opts.example) {
        Ok(app) => app,
        Err(e) => {
            eprintln!("Failed to mount: {e}");
            std::process::exit(1);
        }
    };

    let result = app.run(&opts, |tick, frame| {
        println!("== tick {tick} ==");
        print!("{frame}");
    });
    if let Err(e) = result {
        eprintln!("Runtime error: {e}");
        std::process::exit(1);
    }

    if opts.snapshot {
        match serde_json::to_string_pretty(&app.snapshot()) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to encode snapshot: {e}");
                std::process::exit(1);
            }
        }
    }
}
