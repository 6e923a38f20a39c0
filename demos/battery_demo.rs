// Copyright 2025 N. Dornseif
//
// Dual-licensed under Apache 2.0 and MIT terms.

//! Thin CLI front end over the battery, analogous to the library's
//! original standalone `main.rs`: pick a tier, run it against a handful
//! of generators, print each one's report.

use std::time::Instant;

use prng_battery::battery::{Battery, Tier};
use prng_battery::generator::{Generator, GeneratorDescriptor, Width};
use prng_battery::scheduler::{run_battery, ReportMode, RunOptions};

/// IBM's RANDU, kept as a quick "this should obviously fail" demo
/// generator alongside an honest `ChaCha20` source.
struct Randu {
    state: u32,
}

impl Randu {
    fn new(seed: u64) -> Self {
        let mut state = seed as u32 | 1;
        if state == 0 {
            state = 1;
        }
        Randu { state }
    }
}

impl Generator for Randu {
    fn draw(&mut self) -> u64 {
        self.state = self.state.wrapping_mul(65539) & 0x7FFF_FFFF;
        self.state as u64
    }

    fn width(&self) -> Width {
        Width::W32
    }

    fn reseed(&mut self, seed: u64) {
        *self = Randu::new(seed);
    }
}

struct ChaCha(rand_chacha::ChaCha20Rng);

impl Generator for ChaCha {
    fn draw(&mut self) -> u64 {
        use rand_core::RngCore;
        self.0.next_u64()
    }

    fn width(&self) -> Width {
        Width::W64
    }

    fn reseed(&mut self, seed: u64) {
        use rand_core::SeedableRng;
        self.0 = rand_chacha::ChaCha20Rng::seed_from_u64(seed);
    }
}

fn main() {
    tracing_subscriber::fmt::init();

    let tier = match std::env::args().nth(1).as_deref() {
        Some("full") => Tier::Full,
        Some("default") => Tier::Default,
        _ => Tier::Brief,
    };
    let battery = Battery::standard(tier);
    println!("Running battery `{}` ({} tests)", battery.name, battery.tests.len());

    let descriptors: Vec<GeneratorDescriptor> = vec![
        GeneratorDescriptor::new("chacha20", Width::W64, |seed| {
            use rand_core::SeedableRng;
            Box::new(ChaCha(rand_chacha::ChaCha20Rng::seed_from_u64(seed)))
        }),
        GeneratorDescriptor::new("randu", Width::W32, |seed| Box::new(Randu::new(seed))),
    ];

    let options = RunOptions {
        threads: 0,
        seed: None,
        report_mode: ReportMode::Full,
        test_filter: None,
        per_test_timeout: Some(std::time::Duration::from_secs(60)),
        memory_ceiling_fraction: 0.75,
    };

    for descriptor in &descriptors {
        println!("\nTesting {}", descriptor.name);
        let start = Instant::now();
        match run_battery(&battery, descriptor, &options) {
            Ok(report) => {
                let rendered = match options.report_mode {
                    ReportMode::Brief => report.render_brief(),
                    ReportMode::Full => report.render_full(),
                };
                println!("{rendered}");
                println!("elapsed: {:?}", start.elapsed());
            }
            Err(e) => eprintln!("battery run failed: {e}"),
        }
    }
}
