/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

// Simulates a base-station link: a tone (or a WAV file) is cut into 20 ms
// frames, sent through a network with random delay, reordering and loss,
// and played out through the jitter buffer in fixed 10 ms blocks. The
// played signal can be written to a WAV file for listening.

use clap::Parser;
use jitter::{
    ComfortNoise, Concealment, DecayingRepeat, Frame, JitterBuffer, JitterConfig, Silence,
};
use rand::Rng;

#[derive(Parser, Debug)]
#[clap(about = "Jitter buffer simulation over a lossy, jittery link", version)]
struct Args {
    #[clap(long, default_value_t = 8000, help = "Media clock rate in Hz")]
    sample_rate: u32,

    #[clap(long, default_value_t = 40, help = "Target window in milliseconds")]
    target_ms: u32,

    #[clap(long, default_value_t = 200, help = "Maximum window in milliseconds")]
    max_ms: u32,

    #[clap(long, help = "Keep the standing delay instead of trimming it")]
    fixed: bool,

    #[clap(
        long,
        default_value_t = 30,
        help = "Maximum additional network delay in milliseconds"
    )]
    max_jitter_ms: u32,

    #[clap(
        long,
        default_value_t = 0.0,
        help = "Probability that a frame is held back behind the next one"
    )]
    reorder: f32,

    #[clap(long, default_value_t = 0.0, help = "Probability that a frame is lost")]
    loss: f32,

    #[clap(long, default_value_t = 10, help = "Simulated duration in seconds")]
    duration_secs: u32,

    #[clap(
        long,
        default_value = "repeat",
        help = "Gap concealment: silence, repeat, noise"
    )]
    conceal: String,

    #[clap(long, help = "Read the source signal from a WAV file")]
    input: Option<String>,

    #[clap(long, help = "Write the played signal to a WAV file")]
    output: Option<String>,
}

/// A frame in flight with the time (in ms) it reaches the buffer.
struct InFlight {
    arrival_ms: f64,
    frame: Frame<i16>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = JitterConfig::new(args.sample_rate, args.target_ms, args.max_ms, !args.fixed)
        .with_name("sim");
    let mut jitter: JitterBuffer<i16> = JitterBuffer::create(config)?;

    let frame_samples = (args.sample_rate / 50) as usize;
    let block_samples = (args.sample_rate / 100) as usize;
    let source = load_source(&args, frame_samples * 50 * args.duration_secs as usize)?;

    let mut concealment: Box<dyn Concealment<i16>> = match args.conceal.as_str() {
        "silence" => Box::new(Silence),
        "noise" => Box::new(ComfortNoise::new(0.002)),
        _ => Box::new(DecayingRepeat::default()),
    };

    println!("Jitter buffer simulation");
    println!("========================");
    println!("{:#?}", jitter.config());

    let mut in_flight = send_frames(&args, &source, frame_samples);
    in_flight.sort_by(|a, b| a.arrival_ms.total_cmp(&b.arrival_ms));
    let mut in_flight = in_flight.into_iter().peekable();

    let mut played = Vec::with_capacity(source.len());
    let mut block = vec![0i16; block_samples];
    let block_ms = 10.0;
    let mut now_ms = 0.0;

    while played.len() < source.len() {
        while let Some(next) = in_flight.peek() {
            if next.arrival_ms > now_ms {
                break;
            }
            if let Some(packet) = in_flight.next() {
                jitter.insert(packet.frame);
            }
        }

        jitter.fill(&mut block, Some(concealment.as_mut()));
        played.extend_from_slice(&block);
        now_ms += block_ms;

        if played.len() % (args.sample_rate as usize) < block_samples {
            log::info!(
                "t={:.1}s queued={} standing_delay={:?}",
                now_ms / 1000.0,
                jitter.len(),
                jitter.standing_delay()
            );
        }
    }

    let stats = jitter.statistics();
    println!("\nStatistics");
    println!("==========");
    println!("{stats:#?}");
    println!(
        "Concealment: {:.1}\u{2030} of output",
        jitter::statistics::q14::to_per_mille(stats.concealment_rate_q14())
    );

    if let Some(path) = &args.output {
        write_output(path, args.sample_rate, &played)?;
    }

    jitter.destroy();
    Ok(())
}

/// Cut the source into frames and assign each a random arrival time.
fn send_frames(args: &Args, source: &[i16], frame_samples: usize) -> Vec<InFlight> {
    let mut rng = rand::rng();
    let frame_ms = 20.0;
    let ssrc = rng.random::<u32>();
    let mut timestamp = rng.random::<u32>();

    let mut frames = Vec::new();
    for (seq, chunk) in source.chunks(frame_samples).enumerate() {
        let send_ms = seq as f64 * frame_ms;
        let frame = Frame::from_samples(seq as u16, timestamp, ssrc, chunk);
        timestamp = timestamp.wrapping_add(frame_samples as u32);

        if rng.random::<f32>() < args.loss {
            log::debug!("lost frame seq={}", seq);
            continue;
        }

        let mut delay_ms = rng.random::<f64>() * args.max_jitter_ms as f64;
        if rng.random::<f32>() < args.reorder {
            delay_ms += frame_ms * 1.5;
        }
        frames.push(InFlight {
            arrival_ms: send_ms + delay_ms,
            frame,
        });
    }
    frames
}

fn load_source(args: &Args, samples: usize) -> Result<Vec<i16>, Box<dyn std::error::Error>> {
    if let Some(path) = &args.input {
        return read_input(path, args.sample_rate);
    }

    // 440 Hz tone at half scale
    let rate = args.sample_rate as f32;
    Ok((0..samples)
        .map(|n| {
            let phase = 2.0 * std::f32::consts::PI * 440.0 * n as f32 / rate;
            (phase.sin() * 16384.0) as i16
        })
        .collect())
}

#[cfg(feature = "audio_files")]
fn read_input(path: &str, sample_rate: u32) -> Result<Vec<i16>, Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate != sample_rate || spec.channels != 1 {
        return Err(format!(
            "{path}: expected mono {sample_rate} Hz, got {} channels at {} Hz",
            spec.channels, spec.sample_rate
        )
        .into());
    }
    let samples = match spec.sample_format {
        hound::SampleFormat::Int => reader.samples::<i16>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|s| s.map(|s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
            .collect::<Result<Vec<_>, _>>()?,
    };
    Ok(samples)
}

#[cfg(not(feature = "audio_files"))]
fn read_input(_path: &str, _sample_rate: u32) -> Result<Vec<i16>, Box<dyn std::error::Error>> {
    Err("WAV input requires the audio_files feature".into())
}

#[cfg(feature = "audio_files")]
fn write_output(
    path: &str,
    sample_rate: u32,
    samples: &[i16],
) -> Result<(), Box<dyn std::error::Error>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;
    println!("Wrote {} samples to {path}", samples.len());
    Ok(())
}

#[cfg(not(feature = "audio_files"))]
fn write_output(
    _path: &str,
    _sample_rate: u32,
    _samples: &[i16],
) -> Result<(), Box<dyn std::error::Error>> {
    Err("WAV output requires the audio_files feature".into())
}
