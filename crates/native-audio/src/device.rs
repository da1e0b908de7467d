use crate::audio::downmix;
use crate::recorder::SampleSource;
use anyhow::{Context, anyhow};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::mpsc::UnboundedSender;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

/// Finds the named input device, or the host's default input when no name is given.
pub fn get_or_default_input(device_name: Option<String>) -> anyhow::Result<Device> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());

    let target = match device_name {
        Some(name) => name,
        None => host
            .default_input_device()
            .ok_or_else(|| anyhow!("No default input device"))?
            .name()
            .context("Default input device has no name")?,
    };

    host.input_devices()
        .context("Failed to list input devices")?
        .find(|device| device.name().is_ok_and(|name| name == target))
        .ok_or_else(|| anyhow!("No input device named {target}"))
}

/// One line per input device with its channel count and rate; the default is marked.
pub fn get_available_inputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_device = host
        .default_input_device()
        .and_then(|device| device.name().ok())
        .unwrap_or_default();

    let mut device_names = Vec::new();
    for device in host.input_devices().context("Failed to list input devices")? {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let line = match device.default_input_config() {
            Ok(config) => format!(
                " * {}({}ch, {}hz)",
                name,
                config.channels(),
                config.sample_rate().0
            ),
            Err(_) => format!(" * {name}(no default config)"),
        };
        device_names.push(if name == default_device {
            format!("{line} [default]")
        } else {
            line
        });
    }
    Ok(device_names.join("\n"))
}

fn build_stream(
    device_name: Option<String>,
    tx: UnboundedSender<Vec<f32>>,
) -> anyhow::Result<(Stream, u32)> {
    let device = get_or_default_input(device_name)?;
    tracing::info!("Using input device: {:?}", device.name()?);

    let config = device
        .default_input_config()
        .context("Failed to get default input config")?;
    let channels = config.channels() as usize;
    let sample_rate = config.sample_rate().0;
    let stream_config = config.config();
    tracing::info!("Input stream config: {:?}", &stream_config);

    let stream = device.build_input_stream(
        &stream_config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            // The receiver is gone once the recorder has stopped.
            let _ = tx.send(downmix(data, channels));
        },
        move |err| tracing::error!("An error occurred on input stream: {}", err),
        None,
    )?;
    stream.play()?;
    Ok((stream, sample_rate))
}

struct Worker {
    stop: std_mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// The system microphone.
///
/// `cpal::Stream` cannot leave the thread that built it, so the stream lives
/// on a dedicated thread for as long as the source is open. Closing signals
/// that thread and joins it, which releases the device before returning.
#[derive(Default)]
pub struct MicInput {
    device_name: Option<String>,
    worker: Option<Worker>,
}

impl MicInput {
    pub fn new(device_name: Option<String>) -> Self {
        Self {
            device_name,
            worker: None,
        }
    }
}

impl SampleSource for MicInput {
    fn open(&mut self, tx: UnboundedSender<Vec<f32>>) -> anyhow::Result<u32> {
        self.close();

        let (ready_tx, ready_rx) = std_mpsc::channel::<anyhow::Result<u32>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();
        let device_name = self.device_name.clone();

        let thread = std::thread::Builder::new()
            .name("mic-input".to_string())
            .spawn(move || {
                let stream = match build_stream(device_name, tx) {
                    Ok((stream, sample_rate)) => {
                        let _ = ready_tx.send(Ok(sample_rate));
                        stream
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                // Blocks until close() signals or drops the sender.
                let _ = stop_rx.recv();
                drop(stream);
                tracing::debug!("microphone released");
            })
            .context("Failed to spawn microphone thread")?;

        match ready_rx.recv() {
            Ok(Ok(sample_rate)) => {
                self.worker = Some(Worker {
                    stop: stop_tx,
                    thread,
                });
                Ok(sample_rate)
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(anyhow!("Microphone thread exited before the stream started"))
            }
        }
    }

    fn close(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop.send(());
            if worker.thread.join().is_err() {
                tracing::warn!("microphone thread panicked");
            }
        }
    }
}

impl Drop for MicInput {
    fn drop(&mut self) {
        self.close();
    }
}
