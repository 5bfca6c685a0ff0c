use std::io::{self, BufRead, BufReader};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info, warn};

use oams_host::configfile::Configfile;
use oams_host::core_traits::Mcu;
use oams_host::extras::oams::action::{ACTION_STATUS_MSG, OP_CODE_SUCCESS};
use oams_host::extras::oams::{ActionKind, Oams};
use oams_host::gcode::{CommandError, GCodeCommand, GCodeDispatcher};
use oams_host::mcu::SimulatedMcu;
use oams_host::msgproto::{Command, MessageParams, ParamValue};

/// OAMS host driver, run against an in-process simulated board
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file
    #[arg()]
    config_file: String,

    /// config section of the OAMS board
    #[arg(short, long, default_value = "oams")]
    section: String,

    /// read commands from file instead of from stdin
    #[arg(short, long)]
    debuginput: Option<String>,

    /// write log to file instead of stderr
    #[arg(short, long)]
    logfile: Option<String>,

    /// enable debug messages
    #[arg(short, long)]
    verbose: bool,

    /// seconds the simulated board takes to finish a load or unload
    #[arg(long, default_value_t = 0.5)]
    response_delay: f64,
}

fn init_logging(args: &Args) -> anyhow::Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    if args.verbose {
        builder.filter(None, log::LevelFilter::Debug);
    } else {
        builder.filter(None, log::LevelFilter::Info);
    }
    if let Some(ref logfile) = args.logfile {
        let target = Box::new(
            std::fs::File::create(logfile).with_context(|| format!("Can't create logfile {}", logfile))?,
        );
        builder.target(env_logger::Target::Pipe(target));
    }
    builder.init();
    Ok(())
}

/// Makes the simulated board report success for every load and unload,
/// from its own thread, after `delay`.
fn attach_responder(mcu: &Arc<SimulatedMcu>, delay: Duration) {
    let weak: Weak<SimulatedMcu> = Arc::downgrade(mcu);
    mcu.set_send_hook(move |cmd: &Command| {
        let action = match cmd.name() {
            "oams_cmd_load_spool" => ActionKind::Loading,
            "oams_cmd_unload_spool" => ActionKind::Unloading,
            _ => return,
        };
        let weak = weak.clone();
        thread::spawn(move || {
            thread::sleep(delay);
            if let Some(mcu) = weak.upgrade() {
                mcu.dispatch(
                    &MessageParams::new(ACTION_STATUS_MSG)
                        .with("action", ParamValue::Int(i64::from(action.tag())))
                        .with("code", ParamValue::Int(i64::from(OP_CODE_SUCCESS))),
                );
            }
        });
    });
}

fn register_help(gcode: &Arc<GCodeDispatcher>) {
    let weak = Arc::downgrade(gcode);
    gcode.register_command(
        "HELP",
        Box::new(move |_gcmd: &GCodeCommand| {
            let gcode = weak
                .upgrade()
                .ok_or_else(|| CommandError("command table is gone".to_string()))?;
            let mut lines = vec!["Available extended commands:".to_string()];
            lines.extend(gcode.help().into_iter().map(|(name, desc)| format!("{:<20}: {}", name, desc)));
            Ok(lines.join("\n"))
        }),
        Some("Report the list of available extended G-Code commands"),
    );
}

fn run(args: &Args) -> anyhow::Result<()> {
    let config = Configfile::read(&args.config_file)?;
    if !config.has_section(&args.section) {
        let found = config.get_prefix_sections("oams");
        bail!("section [{}] not found in {} (oams sections: {:?})", args.section, args.config_file, found);
    }
    if !(args.response_delay.is_finite() && args.response_delay >= 0.0) {
        bail!("--response-delay must be a non-negative number of seconds");
    }

    let mcu_name = config.get(&args.section, "mcu", Some("mcu"))?;
    let mcu = Arc::new(SimulatedMcu::new(&mcu_name));
    let mcus: Vec<Arc<dyn Mcu>> = vec![mcu.clone()];
    let oams = Oams::load_config(&config, &args.section, &mcus)
        .with_context(|| format!("Unable to load [{}]", args.section))?;

    let gcode = Arc::new(GCodeDispatcher::new());
    register_help(&gcode);
    oams.register_commands(&gcode);
    mcu.connect().with_context(|| format!("Unable to configure mcu '{}'", mcu_name))?;
    attach_responder(&mcu, Duration::from_secs_f64(args.response_delay));
    info!(
        "{} ready on mcu '{}' (config {})",
        oams.name(),
        mcu_name,
        config.filename().unwrap_or(&args.config_file)
    );

    let input: Box<dyn BufRead> = match args.debuginput {
        Some(ref path) => Box::new(BufReader::new(
            std::fs::File::open(path).with_context(|| format!("Can't open {}", path))?,
        )),
        None => Box::new(BufReader::new(io::stdin())),
    };
    for line in input.lines() {
        let line = line?;
        match gcode.run_script_line(&line) {
            Ok(Some(response)) => println!("// {}", response),
            Ok(None) => {}
            Err(e) => {
                warn!("{}", e);
                println!("!! {}", e);
            }
        }
    }
    Ok(())
}

fn main() {
    let args = Args::parse();
    if let Err(e) = init_logging(&args) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }
    info!("Starting OAMS host...");
    if let Err(e) = run(&args) {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
