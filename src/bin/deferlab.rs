//! deferlab CLI - native REPL over the simulator
//!
//! Run with: cargo run --bin deferlab -- workqueue --seed 7
//!
//! Time is a manual clock: `step` and `run` advance it frame by frame,
//! so the same seed and commands give the same run.

#[cfg(not(target_arch = "wasm32"))]
mod repl {
    use anyhow::{Context, Result, bail};
    use clap::Parser;
    use deferlab::kernel::{
        Clock, ManualClock, SimConfig, TickDriver, Variant, WorkOverrides,
    };
    use log::info;
    use std::io::{self, BufRead, Write};
    use std::path::PathBuf;

    /// Simulate Linux softirqs, tasklets, and workqueues
    #[derive(Debug, Parser)]
    #[clap(name = "deferlab", version)]
    struct Opts {
        /// softirq, tasklet, or workqueue
        #[clap(default_value = "softirq")]
        variant: Variant,

        /// JSON config file; command-line flags override it
        #[clap(short = 'c', long)]
        config: Option<PathBuf>,

        /// Seed for the random source
        #[clap(short = 's', long)]
        seed: Option<u64>,

        /// Worker count (workqueue only)
        #[clap(short = 'w', long)]
        workers: Option<usize>,

        /// Real milliseconds per frame for step and run
        #[clap(short = 'f', long, default_value = "16.0")]
        frame_ms: f64,

        /// Enable verbose output. Specify multiple times to increase verbosity.
        #[clap(short = 'v', long, action = clap::ArgAction::Count)]
        verbose: u8,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) enum Command {
        Start,
        Pause,
        Reset,
        Inject {
            category: Option<String>,
            priority: Option<String>,
        },
        Workers(usize),
        Speed(f64),
        Step(Option<f64>),
        Run(u32, Option<f64>),
        Show,
        Stats,
        Help,
        Quit,
    }

    pub(crate) fn parse_command(line: &str) -> Result<Command> {
        let mut words = line.split_whitespace();
        let Some(cmd) = words.next() else {
            bail!("empty command");
        };
        let arg = |w: Option<&str>| w.map(str::to_string);

        let command = match cmd {
            "start" => Command::Start,
            "pause" => Command::Pause,
            "reset" => Command::Reset,
            "inject" | "raise" => Command::Inject {
                category: arg(words.next()),
                priority: arg(words.next()),
            },
            "workers" => {
                let n = words.next().context("usage: workers N")?;
                Command::Workers(n.parse().context("worker count must be a number")?)
            }
            "speed" => {
                let x = words.next().context("usage: speed X")?;
                Command::Speed(x.parse().context("speed must be a number")?)
            }
            "step" => Command::Step(
                words
                    .next()
                    .map(str::parse)
                    .transpose()
                    .context("frame length must be a number")?,
            ),
            "run" => {
                let n = words.next().context("usage: run N [ms]")?;
                let frames = n.parse().context("frame count must be a number")?;
                let ms = words
                    .next()
                    .map(str::parse)
                    .transpose()
                    .context("frame length must be a number")?;
                Command::Run(frames, ms)
            }
            "show" | "ls" => Command::Show,
            "stats" => Command::Stats,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => bail!("{}: command not found", other),
        };
        Ok(command)
    }

    struct Session {
        driver: TickDriver,
        clock: ManualClock,
        frame_ms: f64,
    }

    impl Session {
        fn frames(&mut self, count: u32, ms: f64) {
            if !self.driver.is_running() {
                println!("paused; 'start' first");
                return;
            }
            for _ in 0..count {
                self.clock.advance(ms);
                if let Some(report) = self.driver.pump(&self.clock) {
                    for id in &report.completed {
                        println!("  ✓ {} completed", id);
                    }
                }
            }
        }

        /// Returns false on quit
        fn execute(&mut self, command: Command) -> bool {
            let variant = self.driver.scheduler().variant();
            match command {
                Command::Start => {
                    self.driver.start(self.clock.now_ms());
                    println!("running");
                }
                Command::Pause => {
                    self.driver.pause();
                    println!("paused");
                }
                Command::Reset => {
                    self.driver.reset();
                    println!("reset");
                }
                Command::Inject { category, priority } => {
                    let result = WorkOverrides::from_hints(
                        variant,
                        category.as_deref(),
                        priority.as_deref(),
                    )
                    .and_then(|o| self.driver.inject(o));
                    match result {
                        Ok(id) => println!("raised {}", id),
                        Err(e) => eprintln!("inject: {}", e),
                    }
                }
                Command::Workers(n) => match self.driver.set_concurrency(n) {
                    Ok(()) => println!("{} workers", n),
                    Err(e) => eprintln!("workers: {}", e),
                },
                Command::Speed(x) => match self.driver.set_speed(x) {
                    Ok(()) => println!("speed {}x", x),
                    Err(e) => eprintln!("speed: {}", e),
                },
                Command::Step(ms) => self.frames(1, ms.unwrap_or(self.frame_ms)),
                Command::Run(n, ms) => self.frames(n, ms.unwrap_or(self.frame_ms)),
                Command::Show => print!("{}", self.driver.snapshot().render_ascii()),
                Command::Stats => {
                    let stats = self.driver.scheduler().stats();
                    println!("injected:  {}", stats.total_injected);
                    println!("completed: {}", stats.total_completed);
                    println!("pending:   {}", self.driver.scheduler().pending().len());
                    println!("latency:   {:.1}ms avg", stats.avg_latency_ms);
                    for (&category, &count) in &stats.by_category {
                        println!(
                            "  {:<16} {:>5}  {:>5.1}%",
                            category.name(),
                            count,
                            stats.share(category)
                        );
                    }
                    if variant != Variant::Softirq {
                        for (priority, count) in &stats.by_priority {
                            println!("  {:<16} {:>5}", priority.label(), count);
                        }
                    }
                }
                Command::Help => print_help(variant),
                Command::Quit => return false,
            }
            true
        }
    }

    fn print_help(variant: Variant) {
        println!("deferlab - Available commands:");
        println!("  start               - Start the simulation");
        println!("  pause               - Pause; in-flight work keeps its progress");
        println!("  reset               - Discard all work and statistics");
        println!("  inject [cat] [prio] - Raise one item now");
        println!("  workers N           - Resize the worker pool (workqueue only)");
        println!("  speed X             - Simulated ms per real ms");
        println!("  step [ms]           - Advance one frame");
        println!("  run N [ms]          - Advance N frames");
        println!("  show                - Draw slots, queue, and history");
        println!("  stats               - Injection and latency statistics");
        println!("  quit                - Exit");
        let ids: Vec<_> = deferlab::kernel::Category::all(variant)
            .iter()
            .map(|c| c.id())
            .collect();
        println!();
        println!("Categories: {}", ids.join(", "));
    }

    fn load_config(opts: &Opts) -> Result<SimConfig> {
        let mut config = match &opts.config {
            Some(path) => {
                let json = std::fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                SimConfig::from_json(&json)?
            }
            None => SimConfig::for_variant(opts.variant),
        };
        if opts.config.is_none() || opts.variant != Variant::default() {
            config.variant = opts.variant;
        }
        if let Some(seed) = opts.seed {
            config.seed = Some(seed);
        }
        if let Some(workers) = opts.workers {
            config.concurrency = workers;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn main() -> Result<()> {
        let opts = Opts::parse();

        let llv = match opts.verbose {
            0 => simplelog::LevelFilter::Warn,
            1 => simplelog::LevelFilter::Info,
            2 => simplelog::LevelFilter::Debug,
            _ => simplelog::LevelFilter::Trace,
        };
        let mut lcfg = simplelog::ConfigBuilder::new();
        lcfg.set_time_level(simplelog::LevelFilter::Off)
            .set_location_level(simplelog::LevelFilter::Off)
            .set_target_level(simplelog::LevelFilter::Error)
            .set_thread_level(simplelog::LevelFilter::Off);
        simplelog::SimpleLogger::init(llv, lcfg.build())?;

        let config = load_config(&opts)?;
        let seed = config.seed.unwrap_or(0x5eed);
        let driver = TickDriver::with_config(&config, seed)?;
        info!("{} with {} slots, seed {}", config.variant, config.concurrency, seed);

        let mut session = Session {
            driver,
            clock: ManualClock::new(0.0),
            frame_ms: opts.frame_ms,
        };

        println!("deferlab v{} ({})", env!("CARGO_PKG_VERSION"), config.variant);
        println!("Type 'help' for available commands.\n");

        let stdin = io::stdin();
        let mut stdout = io::stdout();
        loop {
            print!("{}> ", config.variant);
            let _ = stdout.flush();

            let mut line = String::new();
            match stdin.lock().read_line(&mut line) {
                Ok(0) => {
                    println!();
                    break;
                }
                Ok(_) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match parse_command(line) {
                        Ok(command) => {
                            if !session.execute(command) {
                                break;
                            }
                        }
                        Err(e) => eprintln!("{}", e),
                    }
                }
                Err(e) => {
                    eprintln!("Error reading input: {}", e);
                    break;
                }
            }
        }
        Ok(())
    }

}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    repl::main()
}

#[cfg(target_arch = "wasm32")]
fn main() {}
