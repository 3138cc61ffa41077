//! Device streams through PipeWire
//!
//! Each stream runs its own PipeWire main loop on a dedicated thread and quits
//! when a stop command arrives over a PipeWire channel.

use ::pipewire as pw;
use log::{debug, error};
use pw::spa;
use pw::spa::param::format::{MediaSubtype, MediaType};
use pw::spa::param::format_utils;
use pw::spa::pod::Pod;
use std::thread;

use super::StreamHandle;
use crate::audio::capture::SharedCaptureState;
use crate::audio::playback::SharedPlaybackState;
use crate::error::EngineError;

const APP_NAME: &str = "AudioBox";

enum StreamCommand {
    Stop,
}

pub(super) fn spawn_output(state: SharedPlaybackState) -> Result<StreamHandle, EngineError> {
    let (sender, receiver) = pw::channel::channel::<StreamCommand>();

    let thread = thread::Builder::new()
        .name("audiobox-output".into())
        .spawn(move || {
            if let Err(e) = run_playback_loop(state.clone(), receiver) {
                error!("Playback error: {}", e);
            }
            state.set_playing(false);
        })?;

    Ok(StreamHandle::new(
        move || {
            let _ = sender.send(StreamCommand::Stop);
        },
        thread,
    ))
}

pub(super) fn spawn_input(
    state: SharedCaptureState,
    sample_rate: u32,
) -> Result<StreamHandle, EngineError> {
    let (sender, receiver) = pw::channel::channel::<StreamCommand>();

    let thread = thread::Builder::new()
        .name("audiobox-input".into())
        .spawn(move || {
            if let Err(e) = run_capture_loop(state.clone(), sample_rate, receiver) {
                error!("Capture error: {}", e);
                state.set_error(e);
            }
        })?;

    Ok(StreamHandle::new(
        move || {
            let _ = sender.send(StreamCommand::Stop);
        },
        thread,
    ))
}

/// Serialize an F32LE format request for the stream
fn format_params(rate: u32, channels: u32) -> Result<Vec<u8>, String> {
    let mut audio_info = spa::param::audio::AudioInfoRaw::new();
    audio_info.set_format(spa::param::audio::AudioFormat::F32LE);
    audio_info.set_rate(rate);
    audio_info.set_channels(channels);

    let obj = spa::pod::Object {
        type_: spa::utils::SpaTypes::ObjectParamFormat.as_raw(),
        id: spa::param::ParamType::EnumFormat.as_raw(),
        properties: audio_info.into(),
    };

    Ok(spa::pod::serialize::PodSerializer::serialize(
        std::io::Cursor::new(Vec::new()),
        &spa::pod::Value::Object(obj),
    )
    .map_err(|e| format!("Failed to serialize audio format: {:?}", e))?
    .0
    .into_inner())
}

fn parse_raw_format(param: &Pod, format: &mut spa::param::audio::AudioInfoRaw) {
    let (media_type, media_subtype) = match format_utils::parse_format(param) {
        Ok(v) => v,
        Err(_) => return,
    };

    if media_type != MediaType::Audio || media_subtype != MediaSubtype::Raw {
        return;
    }

    if let Err(e) = format.parse(param) {
        error!("Failed to parse audio format: {:?}", e);
    }
}

/// Stream properties shared by both directions
fn stream_props(category: &str, role: &str) -> pw::properties::PropertiesBox {
    pw::properties::properties! {
        *pw::keys::MEDIA_TYPE => "Audio",
        *pw::keys::MEDIA_CATEGORY => category,
        *pw::keys::MEDIA_ROLE => role,
        *pw::keys::APP_NAME => APP_NAME,
    }
}

/// Connect a mono F32 stream at `rate`; PipeWire converts to the device format
fn connect_mono(
    stream: &pw::stream::Stream,
    direction: spa::utils::Direction,
    rate: u32,
) -> Result<(), String> {
    let values = format_params(rate, 1)?;
    let pod = Pod::from_bytes(&values).ok_or("Invalid audio format pod")?;
    let mut params = [pod];

    stream
        .connect(
            direction,
            None,
            pw::stream::StreamFlags::AUTOCONNECT
                | pw::stream::StreamFlags::MAP_BUFFERS
                | pw::stream::StreamFlags::RT_PROCESS,
            &mut params,
        )
        .map_err(|e| format!("Failed to connect stream: {}", e))
}

/// Set up a main loop that quits on [`StreamCommand::Stop`] and hand it to `body`
///
/// `body` builds its stream and runs the loop; it returns once the loop quits.
fn with_main_loop<F>(receiver: pw::channel::Receiver<StreamCommand>, body: F) -> Result<(), String>
where
    F: FnOnce(&pw::main_loop::MainLoopRc, &pw::core::CoreRc) -> Result<(), String>,
{
    pw::init();

    let mainloop = pw::main_loop::MainLoopRc::new(None)
        .map_err(|e| format!("Failed to create PipeWire main loop: {}", e))?;
    let context = pw::context::ContextRc::new(&mainloop, None)
        .map_err(|e| format!("Failed to create PipeWire context: {}", e))?;
    let core = context
        .connect_rc(None)
        .map_err(|e| format!("Failed to connect to PipeWire: {}", e))?;

    let weak = mainloop.downgrade();
    let _commands = receiver.attach(mainloop.loop_(), move |command| match command {
        StreamCommand::Stop => {
            if let Some(mainloop) = weak.upgrade() {
                mainloop.quit();
            }
        }
    });

    body(&mainloop, &core)
}

/// Pull samples from `state` until stopped or the source ends
fn run_playback_loop(
    state: SharedPlaybackState,
    receiver: pw::channel::Receiver<StreamCommand>,
) -> Result<(), String> {
    struct Output {
        format: spa::param::audio::AudioInfoRaw,
        state: SharedPlaybackState,
        mainloop: pw::main_loop::MainLoopWeak,
    }

    with_main_loop(receiver, |mainloop, core| {
        let rate = state.sample_rate();
        let output = Output {
            format: Default::default(),
            state,
            mainloop: mainloop.downgrade(),
        };

        let stream = pw::stream::StreamBox::new(
            core,
            "audiobox-playback",
            stream_props("Playback", "Music"),
        )
        .map_err(|e| format!("Failed to create PipeWire stream: {}", e))?;

        let _listener = stream
            .add_local_listener_with_user_data(output)
            .param_changed(|_, output, id, param| {
                if let Some(param) = param {
                    if id == spa::param::ParamType::Format.as_raw() {
                        parse_raw_format(param, &mut output.format);
                    }
                }
            })
            .process(|stream, output| {
                let Some(mut buffer) = stream.dequeue_buffer() else {
                    return;
                };
                let Some(data) = buffer.datas_mut().first_mut() else {
                    return;
                };

                let channels = output.format.channels().max(1) as usize;
                let width = std::mem::size_of::<f32>();
                let frame = width * channels;
                let Some(bytes) = data.data() else {
                    return;
                };
                let capacity = bytes.len() / frame;

                let Some(block) = output.state.next_samples(capacity) else {
                    debug!("Output reached end of source");
                    if let Some(mainloop) = output.mainloop.upgrade() {
                        mainloop.quit();
                    }
                    return;
                };

                // Mono source duplicated across every device channel
                for (dst, &sample) in bytes.chunks_exact_mut(frame).zip(block.iter()) {
                    for slot in dst.chunks_exact_mut(width) {
                        slot.copy_from_slice(&sample.to_le_bytes());
                    }
                }
                let written = block.len() * frame;
                bytes[written..].fill(0);

                let chunk = data.chunk_mut();
                *chunk.offset_mut() = 0;
                *chunk.stride_mut() = frame as i32;
                *chunk.size_mut() = written as u32;
            })
            .register()
            .map_err(|e| format!("Failed to register stream listener: {}", e))?;

        connect_mono(&stream, spa::utils::Direction::Output, rate)?;
        mainloop.run();
        Ok(())
    })
}

/// Push input blocks into `state` until stopped
fn run_capture_loop(
    state: SharedCaptureState,
    sample_rate: u32,
    receiver: pw::channel::Receiver<StreamCommand>,
) -> Result<(), String> {
    struct Input {
        format: spa::param::audio::AudioInfoRaw,
        state: SharedCaptureState,
    }

    with_main_loop(receiver, |mainloop, core| {
        let input = Input {
            format: Default::default(),
            state,
        };

        let stream = pw::stream::StreamBox::new(
            core,
            "audiobox-capture",
            stream_props("Capture", "Communication"),
        )
        .map_err(|e| format!("Failed to create PipeWire stream: {}", e))?;

        let _listener = stream
            .add_local_listener_with_user_data(input)
            .param_changed(|_, input, id, param| {
                if let Some(param) = param {
                    if id == spa::param::ParamType::Format.as_raw() {
                        parse_raw_format(param, &mut input.format);
                    }
                }
            })
            .process(|stream, input| {
                let Some(mut buffer) = stream.dequeue_buffer() else {
                    return;
                };
                let Some(data) = buffer.datas_mut().first_mut() else {
                    return;
                };

                let channels = input.format.channels().max(1) as usize;
                let rate = input.format.rate();
                let width = std::mem::size_of::<f32>();
                let frame = width * channels;
                let size = data.chunk().size() as usize;
                let Some(bytes) = data.data() else {
                    return;
                };

                // First channel of every frame
                let mono: Vec<f32> = bytes[..size.min(bytes.len())]
                    .chunks_exact(frame)
                    .filter_map(|samples| samples[..width].try_into().ok())
                    .map(f32::from_le_bytes)
                    .collect();

                input.state.process_samples(&mono, rate);
            })
            .register()
            .map_err(|e| format!("Failed to register stream listener: {}", e))?;

        connect_mono(&stream, spa::utils::Direction::Input, sample_rate)?;
        mainloop.run();
        Ok(())
    })
}
