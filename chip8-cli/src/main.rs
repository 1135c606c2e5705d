//! Entrypoint for CLI
use std::{
    env,
    error::Error,
    fs,
    io::{self, BufRead},
    thread,
    time::{Duration, Instant},
};

use chip8::{prelude::*, KeyCode, IMPL_VERSION};
use log::{error, info, LevelFilter};

use crate::{
    config::CliConf,
    error::AppError,
    terminal::{KeyScript, Terminal},
};

mod config;
mod error;
mod terminal;

static USAGE: &str = r#"
usage: chip8 CMD ROM [CONFIG]

commands:
    run     Run the target ROM file in real time
    step    Execute the target ROM one instruction per input line
    dis     Disassemble the target ROM into readable assembly

In step mode, enter a hex digit to hold that key down
for the next instruction, or q to quit.

examples:
    chip8 run breakout.rom
    chip8 run breakout.rom breakout.yaml
    chip8 step breakout.rom
    chip8 dis breakout.rom
"#;

/// Sleep between scheduler polls.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

fn run_rom(filepath: &str, conf: CliConf) -> Result<(), AppError> {
    if conf.vm.step_mode {
        return step_rom(filepath, conf);
    }

    let bytecode = fs::read(filepath)?;
    let mut scheduler = Scheduler::new(&conf.vm)?;
    let Hz(frequency) = scheduler.clock_frequency();
    info!("running {filepath} at {frequency}Hz");

    let mut vm = Chip8Vm::new(conf.vm.clone());
    vm.load_bytecode(&bytecode)?;

    let limit = conf.run_limit()?;
    let mut script = KeyScript::new(&conf.presses)?;
    let mut terminal = Terminal::new(io::stdout(), conf.render);

    let start = Instant::now();
    let mut report = Report::default();

    let result = loop {
        let elapsed = start.elapsed();
        script.apply(elapsed, terminal.keypad_mut());

        match scheduler.poll(&mut vm, &mut terminal) {
            Ok(update) => {
                report.cycles += update.cycles;
                report.timer_ticks += update.timer_ticks;
            }
            Err(err) => break Err(err),
        }

        if limit.map_or(false, |limit| elapsed >= limit) {
            break Ok(());
        }

        thread::sleep(POLL_INTERVAL);
    };

    info!(
        "stopped after {:.3}s: {} cycles, {} timer ticks, {} frames",
        start.elapsed().as_secs_f64(),
        report.cycles,
        report.timer_ticks,
        terminal.frame_count()
    );
    println!("{}", vm.dump_registers()?);

    Ok(result?)
}

fn step_rom(filepath: &str, mut conf: CliConf) -> Result<(), AppError> {
    info!("stepping {filepath}");

    conf.vm.step_mode = true;

    let bytecode = fs::read(filepath)?;
    let mut scheduler = Scheduler::new(&conf.vm)?;
    let mut vm = Chip8Vm::new(conf.vm.clone());
    vm.load_bytecode(&bytecode)?;

    let mut terminal = Terminal::new(io::stdout(), conf.render);
    let mut line = String::new();
    let stdin = io::stdin();

    // Starts the time measurement for the timers.
    scheduler.poll(&mut vm, &mut terminal)?;

    loop {
        println!("{}", vm.dump_registers()?);
        if let Some(err) = vm.error() {
            println!("halted: {err}");
        } else if vm.is_waiting() {
            println!("waiting for key press");
        } else {
            print_next_instruction(&vm);
        }

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }

        let input = line.trim();
        if input == "q" {
            break;
        }

        let key = parse_key(input);
        if let Some(key) = key {
            terminal.keypad_mut().press(key);
        }

        scheduler.step_signal();
        let result = scheduler.poll(&mut vm, &mut terminal);

        if let Some(key) = key {
            terminal.keypad_mut().release(key);
        }

        // Halting is reported in the next register dump.
        if let Err(err) = result {
            error!("{err}");
        }
    }

    Ok(())
}

fn print_next_instruction(vm: &Chip8Vm) {
    let address = vm.registers().pc;
    match vm.cpu().fetch() {
        Ok(opcode) => match Op::decode(opcode) {
            Some(op) => println!("next: 0x{address:04X}  {opcode}  {op}"),
            None => println!("next: 0x{address:04X}  {opcode}  (invalid)"),
        },
        Err(err) => println!("next: 0x{address:04X}  {err}"),
    }
}

/// Single hex digit to keypad key.
fn parse_key(input: &str) -> Option<KeyCode> {
    if input.len() != 1 {
        return None;
    }
    u8::from_str_radix(input, 16)
        .ok()
        .and_then(|key_id| KeyCode::try_from(key_id).ok())
}

fn disassemble_rom(filepath: &str) -> Result<(), AppError> {
    let bytecode = fs::read(filepath)?;
    print!("{}", Disassembler::new(&bytecode).to_text()?);
    Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Info)
        .env()
        .init()?;

    let cmd = match parse_args() {
        Some(cmd) => cmd,
        None => {
            print_usage();
            // FreeBSD EX_USAGE (64)
            std::process::exit(64)
        }
    };

    let result = match cmd {
        Cmd::Run { filepath, config } => {
            load_config(config.as_deref()).and_then(|conf| run_rom(&filepath, conf))
        }
        Cmd::Step { filepath, config } => {
            load_config(config.as_deref()).and_then(|conf| step_rom(&filepath, conf))
        }
        Cmd::Dis { filepath } => disassemble_rom(&filepath),
    };

    if let Err(err) = result {
        error!("{err}");
        std::process::exit(1);
    }

    Ok(())
}

fn load_config(filepath: Option<&str>) -> Result<CliConf, AppError> {
    match filepath {
        Some(filepath) => CliConf::from_file(filepath),
        None => Ok(CliConf::default()),
    }
}

fn parse_args() -> Option<Cmd> {
    let mut args = env::args().skip(1);
    let cmd = args.next()?;
    let filepath = args.next()?;
    let config = args.next();

    match cmd.as_str() {
        "run" => Some(Cmd::Run { filepath, config }),
        "step" => Some(Cmd::Step { filepath, config }),
        "dis" if config.is_none() => Some(Cmd::Dis { filepath }),
        _ => None,
    }
}

fn print_usage() {
    println!("Chip8 v{IMPL_VERSION}");
    println!("{USAGE}");
}

enum Cmd {
    /// Run in real time
    Run {
        filepath: String,
        config: Option<String>,
    },
    /// Single step debugging
    Step {
        filepath: String,
        config: Option<String>,
    },
    /// Disassemble
    Dis { filepath: String },
}
