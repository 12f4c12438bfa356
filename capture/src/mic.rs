//! Microphone capture using cpal.
//!
//! Linux build note: you need ALSA development headers for `cpal`.
//! On Debian/Ubuntu:
//!   sudo apt-get update && sudo apt-get install -y libasound2-dev pkg-config

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use vox_core::audio::{InputFrame, SampleFormat};

/// Configuration for microphone capture.
#[derive(Clone, Debug)]
pub struct MicConfig {
    /// Preferred sample rate; falls back to 48k/32k/16k/8k if unavailable.
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub chunk_ms: u32,
    pub device_name: Option<String>,
}

impl Default for MicConfig {
    fn default() -> Self {
        let chunk_ms = std::env::var("VOX_MIC_CHUNK_MS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(20);
        let device_name = std::env::var("VOX_MIC_DEVICE").ok();
        Self {
            sample_rate_hz: 24_000,
            channels: 1,
            chunk_ms,
            device_name,
        }
    }
}

pub struct MicSource {
    config: MicConfig,
}

impl MicSource {
    pub fn new(config: MicConfig) -> Self {
        Self { config }
    }

    /// Start capture on a dedicated OS thread (cpal streams are not `Send`)
    /// and stream [`InputFrame`]s back over an mpsc channel.
    pub fn start(self) -> (JoinHandle<()>, mpsc::Receiver<InputFrame>) {
        let (tx, rx) = mpsc::channel::<InputFrame>(64);
        let cfg = self.config;
        let handle = tokio::spawn(async move {
            run_capture_loop(cfg, tx).await;
        });
        (handle, rx)
    }
}

struct AudioPacket {
    samples: Vec<i16>,
    sample_rate_hz: u32,
    channels: u16,
}

async fn run_capture_loop(config: MicConfig, tx: mpsc::Sender<InputFrame>) {
    let (packet_tx, mut packet_rx) = mpsc::channel::<AudioPacket>(64);
    let cfg_for_thread = config.clone();

    std::thread::spawn(move || {
        let host = cpal::default_host();

        let input_device = if let Some(ref needle) = cfg_for_thread.device_name {
            let mut found: Option<cpal::Device> = None;
            if let Ok(devices) = host.input_devices() {
                for dev in devices {
                    if let Ok(name) = dev.name() {
                        if name.to_lowercase().contains(&needle.to_lowercase()) {
                            found = Some(dev);
                            break;
                        }
                    }
                }
            }
            found.or_else(|| host.default_input_device())
        } else {
            host.default_input_device()
        };

        let input_device = match input_device {
            Some(d) => d,
            None => {
                error!("no input device available");
                return;
            }
        };
        let device_name = input_device.name().unwrap_or_else(|_| "unknown".into());

        let supported_configs = match input_device.supported_input_configs() {
            Ok(c) => c,
            Err(e) => {
                error!("failed to query supported input configs: {}", e);
                return;
            }
        };

        let preferred_rates = [
            cfg_for_thread.sample_rate_hz,
            48_000u32,
            32_000u32,
            16_000u32,
            8_000u32,
        ];

        #[derive(Clone)]
        struct Candidate {
            cfg: cpal::SupportedStreamConfig,
            rate_rank: usize,
            fmt_rank: usize,
            ch_penalty: usize,
        }

        fn fmt_rank(fmt: cpal::SampleFormat) -> usize {
            match fmt {
                cpal::SampleFormat::F32 => 3,
                cpal::SampleFormat::I16 => 2,
                cpal::SampleFormat::U16 => 1,
                cpal::SampleFormat::U8 => 0,
                _ => 0,
            }
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for cfg_range in supported_configs {
            let fmt = cfg_range.sample_format();
            let ch = cfg_range.channels();
            for (rank, &rate) in preferred_rates.iter().enumerate() {
                if cfg_range.min_sample_rate().0 <= rate && cfg_range.max_sample_rate().0 >= rate {
                    let ch_penalty = if ch == cfg_for_thread.channels {
                        0
                    } else if ch == 2 {
                        1
                    } else {
                        2
                    };
                    candidates.push(Candidate {
                        cfg: cpal::SupportedStreamConfig::new(
                            ch,
                            cpal::SampleRate(rate),
                            cfg_range.buffer_size().clone(),
                            fmt,
                        ),
                        rate_rank: rank,
                        fmt_rank: fmt_rank(fmt),
                        ch_penalty,
                    });
                }
            }
        }
        candidates.sort_by(|a, b| {
            b.fmt_rank
                .cmp(&a.fmt_rank)
                .then(a.ch_penalty.cmp(&b.ch_penalty))
                .then(a.rate_rank.cmp(&b.rate_rank))
        });

        let chosen_config = if let Some(best) = candidates.first() {
            best.cfg.clone()
        } else {
            match input_device.default_input_config() {
                Ok(c) => c,
                Err(e) => {
                    error!("failed to get default input config: {}", e);
                    return;
                }
            }
        };

        let actual_rate = chosen_config.sample_rate().0;
        let actual_channels = chosen_config.channels();
        info!(
            "mic configured device=\"{}\" rate={}Hz channels={} fmt={:?}",
            device_name,
            actual_rate,
            actual_channels,
            chosen_config.sample_format()
        );

        let samples_per_chunk = ((actual_rate as u64) * (cfg_for_thread.chunk_ms as u64) / 1000)
            as usize
            * (actual_channels as usize);
        let stream_config: cpal::StreamConfig = chosen_config.clone().into();
        let err_fn = |err| error!("cpal input stream error: {}", err);
        let mut callback_acc: Vec<i16> = Vec::with_capacity(samples_per_chunk * 2);
        let packet_tx_clone = packet_tx.clone();

        macro_rules! emit_stream {
            ($ty:ty, $convert:expr) => {{
                let tx_inner = packet_tx_clone.clone();
                input_device.build_input_stream(
                    &stream_config,
                    move |data: &[$ty], _: &cpal::InputCallbackInfo| {
                        let converted: Vec<i16> = data.iter().map($convert).collect();
                        emit_chunks(&converted, &mut callback_acc, samples_per_chunk, |chunk| {
                            let _ = tx_inner.try_send(AudioPacket {
                                samples: chunk,
                                sample_rate_hz: actual_rate,
                                channels: actual_channels,
                            });
                        });
                    },
                    err_fn,
                    None,
                )
            }};
        }

        let stream = match chosen_config.sample_format() {
            cpal::SampleFormat::I16 => emit_stream!(i16, |&s| s),
            cpal::SampleFormat::U8 => emit_stream!(u8, |&s| u8_to_i16(s)),
            cpal::SampleFormat::U16 => emit_stream!(u16, |&s| u16_to_i16(s)),
            cpal::SampleFormat::F32 => emit_stream!(f32, |&s| f32_to_i16(s)),
            other => {
                error!("unsupported cpal sample format: {:?}", other);
                return;
            }
        };

        let stream = match stream {
            Ok(s) => s,
            Err(e) => {
                error!("failed to build input stream: {}", e);
                return;
            }
        };
        if let Err(e) = stream.play() {
            error!("failed to start input stream: {}", e);
            return;
        }

        loop {
            std::thread::sleep(std::time::Duration::from_secs(60));
        }
    });

    while let Some(pkt) = packet_rx.recv().await {
        let frame = if pkt.channels <= 1 {
            InputFrame::Mono {
                rate_hz: pkt.sample_rate_hz,
                samples: SampleFormat::I16(pkt.samples),
            }
        } else {
            InputFrame::Interleaved {
                rate_hz: pkt.sample_rate_hz,
                channels: pkt.channels,
                samples: SampleFormat::I16(pkt.samples),
            }
        };
        if tx.send(frame).await.is_err() {
            warn!("mic frame receiver dropped; stopping capture forwarding");
            break;
        }
    }
}

fn emit_chunks<F: FnMut(Vec<i16>)>(data: &[i16], acc: &mut Vec<i16>, chunk_samples: usize, mut emit: F) {
    acc.extend_from_slice(data);
    while chunk_samples > 0 && acc.len() >= chunk_samples {
        let chunk: Vec<i16> = acc.drain(..chunk_samples).collect();
        emit(chunk);
    }
}

#[inline]
fn f32_to_i16(s: f32) -> i16 {
    let s = s.clamp(-1.0, 1.0);
    (s * i16::MAX as f32) as i16
}

#[inline]
fn u16_to_i16(s: u16) -> i16 {
    (s as i32 - 32768) as i16
}

#[inline]
fn u8_to_i16(s: u8) -> i16 {
    (s as i16 - 128) << 8
}
