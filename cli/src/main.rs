use anyhow::{anyhow, Context};
use std::collections::HashMap;
use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use wavclip_core as core;

const ARGUMENTS: [&str; 2] = ["volume", "loop"];
const DEFAULT_VOLUME: f32 = 1.0;
const POLL_INTERVAL: Duration = Duration::from_millis(10);
// Lets the device play out what the last callback queued
const DRAIN_PERIOD: Duration = Duration::from_millis(250);

const USAGE: &str = "\
Usage: wavclip <command> [-arg[=value]]... [--] <file>

Commands:
    info    Print format details of a WAV file
    play    Play a WAV file on the default output device
    help    Print this message

Arguments (play):
    -volume=<0.0..1.0>    Output gain, defaults to 1.0
    -loop=<frame>         Loop forever, jumping back to <frame> at the end

Set RUST_LOG (e.g. RUST_LOG=debug) for diagnostic output.";

type CommandArgs = HashMap<&'static str, String>;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum CommandKind {
    Info,
    Play,
    Help,
}

impl TryFrom<&str> for CommandKind {
    type Error = String;

    fn try_from(from: &str) -> Result<CommandKind, Self::Error> {
        match from {
            "info" => Ok(CommandKind::Info),
            "play" => Ok(CommandKind::Play),
            "help" => Ok(CommandKind::Help),
            other => Err(format!("Unknown sub-command \"{}\"", other)),
        }
    }
}

type Command = (CommandKind, CommandArgs);

fn parse_arg_param(arg_param: &str) -> Result<(&'static str, String), String> {
    let mut arg_param_iter = arg_param.splitn(2, '=');
    let arg_slice = arg_param_iter.next().unwrap_or("");
    let param = arg_param_iter.next().map(String::from).unwrap_or_default();

    let arg = ARGUMENTS.into_iter().find(|&s| s == arg_slice);

    match arg {
        None => Err(format!("Unrecognized argument {}", arg_slice)),
        Some(a) => Ok((a, param)),
    }
}

fn parse_args<'a, T: Iterator<Item = &'a str>>(
    mut args: T,
) -> Result<Command, String> {
    let cmd = args
        .next()
        .map(|cmd| cmd.try_into())
        .ok_or(String::from("Missing sub-command"))
        .and_then(|x| x)?;

    let mut map = HashMap::new();
    let mut reached_end = false;
    let mut reached_divider = false;

    while !reached_end {
        if let Some(arg) = args.next() {
            if arg.starts_with('-') && !reached_divider {
                if arg == "--" {
                    reached_divider = true;
                } else {
                    let arg = arg.trim_start_matches('-');
                    let (argname, param) = parse_arg_param(arg)?;
                    map.insert(argname, param);
                }
            } else {
                map.insert("in", arg.into());
                reached_end = true;
            }
        } else {
            reached_end = true;
        }
    }

    if let Some(last) = args.next() {
        return Err(format!("Unrecognized argument \"{}\"", last));
    }

    Ok((cmd, map))
}

fn expect_arg<'a>(args: &'a CommandArgs, argname: &str) -> anyhow::Result<&'a String> {
    args.get(argname).ok_or_else(|| {
        if argname == "in" {
            anyhow!("No input file provided")
        } else {
            anyhow!("Expected argument \"{}\"", argname)
        }
    })
}

fn volume_arg(args: &CommandArgs) -> anyhow::Result<f32> {
    args.get("volume")
        .map(|v| {
            v.parse::<f32>()
                .with_context(|| format!("Invalid volume \"{}\"", v))
        })
        .transpose()
        .map(|v| v.unwrap_or(DEFAULT_VOLUME))
}

fn loop_arg(args: &CommandArgs) -> anyhow::Result<Option<usize>> {
    args.get("loop")
        .map(|v| {
            v.parse::<usize>()
                .with_context(|| format!("Invalid loop frame \"{}\"", v))
        })
        .transpose()
}

fn run_command((cmd, args): Command) -> anyhow::Result<()> {
    match cmd {
        CommandKind::Help => println!("{}", USAGE),
        CommandKind::Info => {
            let inpath = Path::new(expect_arg(&args, "in")?);
            let info = core::load_wave_info(inpath)
                .with_context(|| format!("Failed to read {}", inpath.display()))?;
            print_info(&info);
        }
        CommandKind::Play => {
            let inpath = Path::new(expect_arg(&args, "in")?);
            let volume = volume_arg(&args)?;
            let loop_start = loop_arg(&args)?;
            let audio = core::load_wave(inpath)
                .with_context(|| format!("Failed to read {}", inpath.display()))?;
            play_wave(audio, volume, loop_start)?;
        }
    }

    Ok(())
}

fn print_info(info: &core::WaveInfo) {
    let header = &info.header;
    let audio = &info.audio;

    println!("Information");
    println!("\tAudio format = {}", header.audio_format);
    println!("\tChannels = {}", header.channel_count);
    println!("\tSample rate = {}", header.sample_rate_hz);
    println!("\tSample bits = {}", header.bit_depth);
    println!(
        "\tDuration = {} frames ({:.3}s)",
        audio.frame_count(),
        audio.duration().as_secs_f64(),
    );
    println!("\tPeak = {:.4}", audio.peak());
}

fn play_wave(
    audio: core::DecodedAudio,
    volume: f32,
    loop_start: Option<usize>,
) -> anyhow::Result<()> {
    let looped = loop_start.is_some();
    let duration = audio.duration();
    let mut player = if looped {
        core::Player::new(&core::PlayerConfig {
            audio,
            volume,
            loop_start,
            end: None,
        })?
    } else {
        core::setup_player(audio, volume)?
    };

    player.play(0, looped)?;
    let started = Instant::now();

    println!("Playing. . .");

    loop {
        sleep(POLL_INTERVAL);

        let finished = playback_finished(
            player.frames_remaining(),
            started.elapsed(),
            duration,
        );

        if !looped && finished {
            break;
        }
    }

    sleep(DRAIN_PERIOD);

    player.stop();

    println!("Done.");

    Ok(())
}

/// The stream has consumed every frame and the clip's wall-clock length
/// has passed.
fn playback_finished(
    frames_remaining: usize,
    elapsed: Duration,
    duration: Duration,
) -> bool {
    frames_remaining == 0 && elapsed >= duration
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args_owned: Vec<String> = env::args().skip(1).collect();
    let args = args_owned.iter().map(|arg| &arg[..]);

    let result = parse_args(args)
        .map_err(|e| anyhow!(e))
        .and_then(run_command);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::debug!("Command failed: {:?}", e);
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
