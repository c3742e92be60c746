use std::io::{Read, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use stsbus_frame::{
    Frame, FrameConfig, FrameReader, FrameWriter, Instruction, Status, BROADCAST_ID, MAX_DEVICE_ID,
};
use stsbus_transport::{BusStream, SerialBus, SerialConfig};
use tracing::debug;

use crate::config::BusConfig;
use crate::correlator::{Correlator, Event, PendingRequest, Reply, Request};
use crate::eprom::EpromUnlock;
use crate::error::{Result, ServoError};
use crate::receiver;
use crate::register::Register;

/// A half-duplex servo bus.
///
/// Owns two background threads: a receiver that decodes the incoming byte
/// stream, and a correlator that suppresses echoes and hands replies to the
/// caller waiting for them. Verbs can be called from any number of threads;
/// a bus-wide lock is held from the moment a request is written until its
/// reply arrives or its timeout elapses, so exchanges never overlap on the
/// wire.
///
/// Query verbs (`ping`, `read_*`) return `Ok(None)` when the device does not
/// answer in time. Every other verb returns as soon as its frame is written.
pub struct ServoBus<W = BusStream> {
    writer: Mutex<FrameWriter<W>>,
    events: Sender<Event>,
    config: BusConfig,
    persistent: AtomicBool,
    next_ticket: AtomicU64,
    running: Arc<AtomicBool>,
    receiver: Option<JoinHandle<()>>,
    correlator: Option<JoinHandle<()>>,
}

impl ServoBus<BusStream> {
    /// Open a serial port and start the bus.
    ///
    /// The port's read timeout is `config.poll_interval`; the
    /// `read_timeout` in `serial` is not used, since the receiver thread
    /// owns all reads.
    pub fn open(path: impl AsRef<Path>, serial: &SerialConfig, config: BusConfig) -> Result<Self> {
        let stream = SerialBus::open_with_config(path, &port_settings(serial, &config))?;
        Self::from_stream(stream, config)
    }

    /// Start the bus on an already connected stream.
    pub fn from_stream(stream: BusStream, config: BusConfig) -> Result<Self> {
        let reader_stream = stream.try_clone()?;
        let frame_config = FrameConfig {
            read_timeout: Some(config.poll_interval),
            ..FrameConfig::default()
        };
        let reader = FrameReader::with_config_bus(reader_stream, frame_config.clone())?;
        let writer = FrameWriter::with_config(stream, frame_config);
        Self::from_parts(reader, writer, config)
    }
}

impl<W: Write + Send + 'static> ServoBus<W> {
    /// Start the bus on separate read and write halves.
    ///
    /// The reader should return periodically (timeouts or EOF) so
    /// [`ServoBus::shutdown`] can stop the receiver thread.
    pub fn spawn<R>(reader: R, writer: W, config: BusConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        Self::from_parts(FrameReader::new(reader), FrameWriter::new(writer), config)
    }

    fn from_parts<R>(reader: FrameReader<R>, writer: FrameWriter<W>, config: BusConfig) -> Result<Self>
    where
        R: Read + Send + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));

        let correlator = Correlator::new(config.expect_echo);
        let correlator_handle = thread::Builder::new()
            .name("stsbus-correlator".to_string())
            .spawn(move || correlator.run(events_rx))
            .map_err(ServoError::Spawn)?;

        let receiver_events = events_tx.clone();
        let receiver_running = Arc::clone(&running);
        let receiver_handle = match thread::Builder::new()
            .name("stsbus-receiver".to_string())
            .spawn(move || receiver::run(reader, receiver_events, receiver_running))
        {
            Ok(handle) => handle,
            Err(err) => {
                let _ = events_tx.send(Event::Shutdown);
                let _ = correlator_handle.join();
                return Err(ServoError::Spawn(err));
            }
        };

        Ok(Self {
            writer: Mutex::new(writer),
            events: events_tx,
            persistent: AtomicBool::new(config.persistent),
            config,
            next_ticket: AtomicU64::new(1),
            running,
            receiver: Some(receiver_handle),
            correlator: Some(correlator_handle),
        })
    }

    /// Bus configuration. `persistent` holds the value the bus started with;
    /// see [`ServoBus::is_persistent`] for the current mode.
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Enable or disable EPROM persistence for configuration writes.
    pub fn set_persistent(&self, persistent: bool) {
        self.persistent.store(persistent, Ordering::Relaxed);
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent.load(Ordering::Relaxed)
    }

    /// Check that a device is present. Returns its status byte.
    pub fn ping(&self, id: u8) -> Result<Option<Status>> {
        let reply = self.transact(
            id,
            Instruction::Ping,
            &[],
            Request::Status(Instruction::Ping),
            Some(self.config.reply_timeout),
        )?;
        Ok(reply.map(|reply| reply.status))
    }

    /// Command a goal position. Does not wait for the device.
    pub fn move_to(&self, id: u8, position: u16) -> Result<()> {
        self.write_register(id, Register::TargetPosition, position)
    }

    /// Read the present position.
    pub fn read_position(&self, id: u8) -> Result<Option<u16>> {
        self.read_register(id, Register::CurrentPosition, self.config.reply_timeout)
    }

    /// Read the present load.
    pub fn read_load(&self, id: u8) -> Result<Option<u16>> {
        self.read_register(id, Register::CurrentLoad, self.config.reply_timeout)
    }

    /// Read one register, waiting up to `timeout` for the reply.
    pub fn read_register(&self, id: u8, register: Register, timeout: Duration) -> Result<Option<u16>> {
        let reply = self.transact(
            id,
            Instruction::ReadData,
            &[register.address(), register.width()],
            Request::Read(register),
            Some(timeout),
        )?;
        Ok(reply.and_then(|reply| reply.value))
    }

    /// Write one register. Does not wait for the device.
    pub fn write_register(&self, id: u8, register: Register, value: u16) -> Result<()> {
        let data = register
            .encode_value(value)
            .ok_or(ServoError::InvalidValue { register, value })?;
        let mut params = Vec::with_capacity(1 + data.len());
        params.push(register.address());
        params.extend_from_slice(&data);

        self.transact(
            id,
            Instruction::WriteData,
            &params,
            Request::Status(Instruction::WriteData),
            None,
        )?;
        Ok(())
    }

    /// Set or clear EPROM write protection.
    pub fn lock_eprom(&self, id: u8, locked: bool) -> Result<()> {
        self.write_register(id, Register::LockFlag, u16::from(locked))
    }

    /// Renumber a device.
    ///
    /// In persistent mode the EPROM is re-locked under the new id, since the
    /// device stops answering to the old one once the write lands.
    pub fn set_id(&self, id: u8, new_id: u8) -> Result<()> {
        if new_id > MAX_DEVICE_ID {
            return Err(ServoError::InvalidValue {
                register: Register::Id,
                value: new_id.into(),
            });
        }
        self.persistent_write(id, new_id, || {
            self.write_register(id, Register::Id, new_id.into())
        })
    }

    /// Choose which instructions the device answers.
    pub fn set_response_level(&self, id: u8, level: u8) -> Result<()> {
        self.persistent_write(id, id, || {
            self.write_register(id, Register::ResponseLevel, level.into())
        })
    }

    /// Limit output torque.
    pub fn set_max_torque(&self, id: u8, torque: u16) -> Result<()> {
        self.persistent_write(id, id, || {
            self.write_register(id, Register::MaxTorque, torque)
        })
    }

    /// Restore factory settings. Does not wait for the device.
    pub fn reset(&self, id: u8) -> Result<()> {
        self.transact(
            id,
            Instruction::Reset,
            &[],
            Request::Status(Instruction::Reset),
            None,
        )?;
        Ok(())
    }

    /// Stop the background threads and wait for them to exit.
    pub fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.receiver.take() {
            let _ = handle.join();
        }
    }

    /// Run `write` inside an unlock/lock sequence when persistence is on.
    ///
    /// The lock goes to `relock_id` if the write succeeded and back to `id`
    /// if it failed.
    fn persistent_write(
        &self,
        id: u8,
        relock_id: u8,
        write: impl FnOnce() -> Result<()>,
    ) -> Result<()> {
        if !self.is_persistent() {
            return write();
        }

        let unlocked = EpromUnlock::acquire(self, id)?;
        match write() {
            Ok(()) => unlocked.retarget(relock_id).release(),
            Err(err) => {
                let _ = unlocked.release();
                Err(err)
            }
        }
    }

    /// Send one request and, if `wait` is set, block for its reply.
    ///
    /// The bus lock is held for the whole exchange. The pending request is
    /// announced to the correlator before the bytes are written so the echo
    /// can never overtake it.
    fn transact(
        &self,
        id: u8,
        instruction: Instruction,
        params: &[u8],
        request: Request,
        wait: Option<Duration>,
    ) -> Result<Option<Reply>> {
        let frame = Frame::request(id, instruction, params)?;
        let mut writer = self.lock_writer();

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let answers = id != BROADCAST_ID;
        let (reply_tx, reply_rx) = match wait {
            Some(_) if answers => {
                let (tx, rx) = mpsc::sync_channel(1);
                (Some(tx), Some(rx))
            }
            _ => (None, None),
        };
        let pending = answers.then(|| PendingRequest {
            ticket,
            request,
            echo_seen: false,
            reply_tx,
        });

        self.events
            .send(Event::Outgoing {
                frame: frame.clone(),
                pending,
            })
            .map_err(|_| ServoError::BusClosed)?;

        if let Err(err) = writer.write_frame(&frame) {
            self.expire(id, ticket);
            return Err(err.into());
        }

        let (Some(reply_rx), Some(timeout)) = (reply_rx, wait) else {
            return Ok(None);
        };
        match reply_rx.recv_timeout(timeout) {
            Ok(reply) => Ok(Some(reply)),
            Err(RecvTimeoutError::Timeout) => {
                self.expire(id, ticket);
                debug!(id, instruction = instruction.name(), ?timeout, "no reply");
                Ok(None)
            }
            Err(RecvTimeoutError::Disconnected) => Err(ServoError::BusClosed),
        }
    }

    fn expire(&self, id: u8, ticket: u64) {
        let _ = self.events.send(Event::Expired { id, ticket });
    }

    fn lock_writer(&self) -> MutexGuard<'_, FrameWriter<W>> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn port_settings(serial: &SerialConfig, config: &BusConfig) -> SerialConfig {
    SerialConfig {
        read_timeout: config.poll_interval,
        ..*serial
    }
}

impl<W> ServoBus<W> {
    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        let _ = self.events.send(Event::Shutdown);
        if let Some(handle) = self.correlator.take() {
            let _ = handle.join();
        }
    }
}

impl<W> Drop for ServoBus<W> {
    fn drop(&mut self) {
        // The receiver notices the cleared flag on its next read timeout.
        self.stop();
    }
}

impl<W> std::fmt::Debug for ServoBus<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServoBus")
            .field("config", &self.config)
            .field("persistent", &self.persistent.load(Ordering::Relaxed))
            .finish()
    }
}
