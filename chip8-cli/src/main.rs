//! Entrypoint for CLI
use std::env;

use chip8_vm::{debug::dump_keys, prelude::*};
use log::{error, info};

mod script;

use self::script::RunConfig;

static USAGE: &str = r#"
usage: chip8 CMD ROM [ARGS]

commands:
    run     Run the target ROM file headless, then print the display
    step    Execute single instructions, then rewind them all

examples:
    chip8 run breakout.rom
    chip8 run breakout.rom breakout.yaml
    chip8 step breakout.rom 20
"#;

fn run_bytecode(filepath: &str, config_path: Option<&str>) -> Chip8Result<()> {
    let config = match config_path {
        Some(path) => RunConfig::from_file(path)?,
        None => RunConfig::default(),
    };

    let mut vm = Chip8Vm::headless(config.vm.clone());
    vm.load_file(filepath)?;
    info!(
        "running {filepath} for {} frames at {} instructions per frame",
        config.frames,
        vm.instructions_per_frame()
    );

    let mut clock = FrameClock::default();
    let mut result = Ok(Flow::Ok);

    for frame in 0..config.frames {
        for event in config.keys_at(frame) {
            vm.devices_mut().set_key(event.key, event.pressed);
        }

        result = vm.run_frame();
        if result.is_err() {
            break;
        }

        if config.throttle {
            clock.wait();
        }
    }

    println!("{}", vm.dump_display()?);
    println!("{}", vm.dump_registers()?);
    println!("{}", dump_keys(&vm.devices().keypad)?);

    result?;

    Ok(())
}

/// Step forwards, then rewind every step.
///
/// Returns whether rewinding arrived back at the initial state.
fn run_stepper(filepath: &str, step_count: usize) -> Chip8Result<bool> {
    let mut vm = Chip8Vm::headless(Chip8Conf {
        history_capacity: step_count,
        ..Chip8Conf::default()
    });
    vm.load_file(filepath)?;

    let initial = vm.snapshot();
    let mut stepper = Stepper::new(&mut vm);
    let mut taken = 0;

    for _ in 0..step_count {
        let flow = stepper.step_forward()?;
        taken += 1;
        println!("{:?}\n{}\n", flow, stepper.vm().dump_registers()?);
    }

    while stepper.step_backward() {}

    let restored = vm.snapshot() == initial;
    if restored {
        info!("rewound {taken} steps to the initial state");
    } else {
        error!("rewinding {taken} steps did not restore the initial state");
    }

    Ok(restored)
}

fn main() {
    if let Err(err) = simple_logger::SimpleLogger::new().env().init() {
        eprintln!("failed to initialise logger: {err}");
    }

    let result = match parse_args() {
        Some(Cmd::Run { filepath, config }) => run_bytecode(&filepath, config.as_deref()),
        Some(Cmd::Step { filepath, count }) => match run_stepper(&filepath, count) {
            Ok(true) => Ok(()),
            // FreeBSD EX_SOFTWARE (70)
            Ok(false) => std::process::exit(70),
            Err(err) => Err(err),
        },
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(exit_code(&err))
    }
}

/// Exit status for a failed command.
fn exit_code(err: &Chip8Error) -> i32 {
    match err {
        // FreeBSD EX_DATAERR (65), the ROM is at fault.
        err if err.is_fatal() => 65,
        // FreeBSD EX_IOERR (74)
        Chip8Error::Io(_) => 74,
        // FreeBSD EX_CONFIG (78)
        Chip8Error::Config(_) => 78,
        _ => 1,
    }
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    let cmd = args.next()?;
    let filepath = args.next()?;

    match cmd.as_str() {
        "run" => Some(Cmd::Run {
            filepath,
            config: args.next(),
        }),
        "step" => Some(Cmd::Step {
            filepath,
            count: args.next()?.parse().ok()?,
        }),
        _ => None,
    }
}

fn print_usage() {
    println!("Chip8 v{}", env!("CARGO_PKG_VERSION"));
    println!("{USAGE}");
}

enum Cmd {
    /// Run file
    Run {
        filepath: String,
        config: Option<String>,
    },
    /// Step forwards, then backwards
    Step { filepath: String, count: usize },
}
