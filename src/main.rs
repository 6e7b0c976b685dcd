use mm_harness::{make_matcher, mm_ref, test_harness, HarnessConfig, CANDIDATES};

fn main() {
    let _ = env_logger::builder().try_init();

    let config = match HarnessConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("{e}");
            std::process::exit(2);
        }
    };
    println!("Config: {:?}", config);

    let input = config.input();
    let matcher = make_matcher(mm_ref).with_tolerance(config.tolerance);

    let mut failed = 0;
    for &(name, kernel) in CANDIDATES {
        match test_harness(&matcher, name, kernel, &input, &config.bench) {
            Ok(report) => println!("{report}"),
            Err(e) => {
                println!("{e}");
                failed += 1;
            }
        }
    }
    println!("{} of {} kernels match", CANDIDATES.len() - failed, CANDIDATES.len());
}
