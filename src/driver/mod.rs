//! # Unit Driver
//!
//! Caller-facing operations on the control units behind one link.
//!
//! This module handles:
//! - Framing each command for the link's addressing mode
//! - The inter-command delay in front of every write
//! - The acknowledgment cycle on point-to-point links
//! - The per-unit enable bitmask
//! - Telemetry requests and unit discovery
//!
//! Every operation runs to completion before it returns; nothing is spawned
//! and nothing polls in the background. One driver owns its link, so
//! sharing a link between tasks means sharing the driver behind a lock.

pub mod ack;
pub mod discovery;

use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::{AfarError, FrameError, Result};
use crate::transport::{self, Transport};
use crate::wire::commands::{self, BeamCalibration, BeamTask, BenchCalibration, Command};
use crate::wire::decoder::decode_frame;
use crate::wire::encoder::{encode_frame, CommandCounter};
use crate::wire::protocol::{code, AddressingMode, Element, Path, PhaseCode, MAX_BUS_ADDRESS};
use crate::wire::state::UnitState;
use crate::wire::telemetry::{decode_telemetry, TelemetryRecord};

use ack::{AckStatus, LinkPhase, RetryState, DEFAULT_MAX_ATTEMPTS};
use discovery::DISCOVERY_RANGE;

/// Timing and addressing knobs of a driver
#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub mode: AddressingMode,
    /// Wait for one reply
    pub read_timeout: Duration,
    /// Pause in front of every command write
    pub write_delay: Duration,
    /// Attempts per command on acknowledging links
    pub max_attempts: u8,
    /// Power-supply settle time after switching VIPs on
    pub vip_settle: Duration,
    /// Address of the single unit on a point-to-point link
    pub unit_address: Option<u8>,
}

impl DriverOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.addressing_mode(),
            read_timeout: config.link.read_timeout(),
            write_delay: config.link.write_delay(),
            max_attempts: config.protocol.max_attempts,
            vip_settle: Duration::from_millis(config.protocol.vip_settle_ms),
            unit_address: config.protocol.unit_address,
        }
    }
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            mode: AddressingMode::Bus,
            read_timeout: Duration::from_secs(1),
            write_delay: Duration::from_millis(100),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            vip_settle: Duration::from_secs(7),
            unit_address: None,
        }
    }
}

/// Protocol driver for the units behind one link
pub struct UnitDriver<T: Transport> {
    transport: T,
    options: DriverOptions,
    counter: CommandCounter,
    retry: RetryState,
    phase: LinkPhase,
    units: BTreeMap<u8, UnitState>,
}

impl UnitDriver<Box<dyn Transport>> {
    /// Open the configured link and wrap it in a driver
    ///
    /// # Errors
    ///
    /// Returns error if the link cannot be opened
    pub async fn connect(config: &Config) -> Result<Self> {
        let transport = transport::connect(&config.link).await?;
        Ok(Self::new(transport, DriverOptions::from_config(config)))
    }
}

impl<T: Transport> UnitDriver<T> {
    pub fn new(transport: T, options: DriverOptions) -> Self {
        let retry = RetryState::new(options.max_attempts);
        Self {
            transport,
            options,
            counter: CommandCounter::new(),
            retry,
            phase: LinkPhase::Idle,
            units: BTreeMap::new(),
        }
    }

    /// Close the link. Later operations fail with `LinkNotOpen`.
    pub async fn disconnect(&mut self) -> Result<()> {
        info!("Disconnecting {}", self.transport.describe());
        self.phase = LinkPhase::Idle;
        self.transport.close().await
    }

    pub fn mode(&self) -> AddressingMode {
        self.options.mode
    }

    pub fn phase(&self) -> LinkPhase {
        self.phase
    }

    /// Address bound to a point-to-point link
    pub fn unit_address(&self) -> Option<u8> {
        self.options.unit_address
    }

    /// Last enable bitmask pushed to a unit
    pub fn unit_state(&self, unit: u8) -> Option<&UnitState> {
        self.units.get(&unit)
    }

    /// Failed attempts of the command in flight
    pub fn retry_attempts(&self) -> u8 {
        self.retry.attempts()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Set one element attenuator
    pub async fn set_attenuator(&mut self, unit: u8, element: Element, path: Path, value: u8) -> Result<()> {
        info!("BU#{}. Setting {} {} attenuator to {}", unit, element, path, value);
        self.send(unit, commands::attenuator(element, path, value)).await
    }

    /// Set the MDO attenuator of a path
    pub async fn set_mdo_attenuator(&mut self, unit: u8, path: Path, value: u8) -> Result<()> {
        info!("BU#{}. Setting MDO {} attenuator to {}", unit, path, value);
        self.send(unit, commands::mdo_attenuator(path, value)).await
    }

    /// Load the whole attenuator table
    pub async fn set_attenuators(&mut self, unit: u8, values: &[u8]) -> Result<()> {
        info!("BU#{}. Loading {} attenuator values", unit, values.len());
        let command = commands::attenuator_bulk(values)?;
        self.send(unit, command).await
    }

    /// Set one element phase shifter
    pub async fn set_phase_shifter(
        &mut self,
        unit: u8,
        element: Element,
        path: Path,
        phase: PhaseCode,
        calibrated: bool,
    ) -> Result<()> {
        info!(
            "BU#{}. Setting {} {} phase shifter to {} ({:.3} deg)",
            unit,
            element,
            path,
            phase.value(),
            phase.degrees()
        );
        let command = commands::phase_shifter(self.options.mode, element, path, phase, calibrated);
        self.send(unit, command).await
    }

    /// Set consecutive phase shifters starting with element 1
    pub async fn set_phase_shifters(
        &mut self,
        unit: u8,
        path: Path,
        phases: &[PhaseCode],
        calibrated: bool,
    ) -> Result<()> {
        info!("BU#{}. Loading {} {} phase codes", unit, phases.len(), path);
        let command = commands::phase_shifter_bulk(self.options.mode, path, phases, calibrated)?;
        self.send(unit, command).await
    }

    /// Set the delay line discrete of a path
    pub async fn set_delay(&mut self, unit: u8, path: Path, discrete: u8, calibrated: bool) -> Result<()> {
        info!("BU#{}. Setting {} delay to {}", unit, path, discrete);
        let command = commands::delay_line(self.options.mode, path, discrete, calibrated);
        self.send(unit, command).await
    }

    /// Switch one element of one path on or off.
    ///
    /// The stored bitmask only changes once the unit accepted the new one.
    pub async fn switch_element(&mut self, unit: u8, element: Element, path: Path, on: bool) -> Result<()> {
        info!(
            "BU#{}. Switching {} {} {}",
            unit,
            element,
            path,
            if on { "on" } else { "off" }
        );
        self.check_switch_target(unit)?;

        let mut state = self.state_of(unit);
        state.set_element(element, path, on);
        self.push_state(unit, state).await
    }

    /// Switch every element of every path off
    pub async fn switch_all_off(&mut self, unit: u8) -> Result<()> {
        info!("BU#{}. Switching all elements off", unit);
        self.check_switch_target(unit)?;

        let mut state = self.state_of(unit);
        state.clear_all();
        self.push_state(unit, state).await
    }

    pub async fn set_beam_calibration_mode(&mut self, unit: u8, params: &BeamCalibration) -> Result<()> {
        info!(
            "BU#{}. Beam calibration mode: {} table {} beam {} ({} strobes, calibration {})",
            unit,
            params.path,
            params.table_number,
            params.beam_number,
            params.strobes,
            if params.with_calibration { "on" } else { "off" }
        );
        self.send(unit, commands::beam_calibration(params)).await
    }

    pub async fn set_bench_calibration_mode(&mut self, unit: u8, params: &BenchCalibration) -> Result<()> {
        info!(
            "BU#{}. Bench calibration mode: {} delay {} phase {} ({} strobes)",
            unit,
            params.path,
            params.delay,
            params.phase.value(),
            params.strobes
        );
        self.send(unit, commands::bench_calibration(params)).await
    }

    /// Append a beam to the unit's task queue
    pub async fn enqueue_beam_task(&mut self, unit: u8, task: &BeamTask) -> Result<()> {
        info!(
            "BU#{}. Queueing beam rx {} tx {} for {} strobes{}",
            unit,
            task.rx_beam,
            task.tx_beam,
            task.strobes,
            if task.cycle { " (cycled)" } else { "" }
        );
        self.send(unit, commands::task_append(task)).await
    }

    pub async fn reset_task_queue(&mut self, unit: u8) -> Result<()> {
        info!("BU#{}. Resetting task queue", unit);
        self.send(unit, commands::task_reset()).await
    }

    /// Power the VIPs up, then optionally wait for them to settle
    pub async fn turn_vips_on(&mut self, unit: u8, wait: bool) -> Result<()> {
        info!("BU#{}. Turning VIPs on", unit);
        self.send(unit, commands::vip_power(true)).await?;

        if wait && !self.options.vip_settle.is_zero() {
            debug!("BU#{}. Waiting {:?} for VIPs to settle", unit, self.options.vip_settle);
            tokio::time::sleep(self.options.vip_settle).await;
        }
        Ok(())
    }

    pub async fn turn_vips_off(&mut self, unit: u8) -> Result<()> {
        info!("BU#{}. Turning VIPs off", unit);
        self.send(unit, commands::vip_power(false)).await
    }

    /// Ask a unit for telemetry
    ///
    /// Returns `Ok(None)` when the unit stays silent, so polling loops can
    /// carry on.
    ///
    /// # Errors
    ///
    /// Returns `FrameError` when the reply is not a valid frame from `unit`
    /// answering the request, and `DecodeError` when its body is too short
    pub async fn request_telemetry(&mut self, unit: u8) -> Result<Option<TelemetryRecord>> {
        info!("BU#{}. Requesting telemetry", unit);
        let address = self.resolve_address(unit)?;
        let bytes = self.frame_bytes(unit, commands::telemetry_request())?;

        self.write_command(&bytes).await?;
        let reply = self.transport.read_reply(self.options.read_timeout).await?;

        if reply.is_empty() {
            warn!("BU#{}. No telemetry reply", unit);
            return Ok(None);
        }

        let frame = decode_frame(self.options.mode, &reply)?;
        if frame.address != address || frame.command_code != code::TELEMETRY {
            return Err(FrameError::UnexpectedReply {
                address: frame.address,
                code: frame.command_code,
            }
            .into());
        }

        let record = decode_telemetry(&frame.payload)?;
        debug!("BU#{}. Telemetry: {:?}", unit, record);
        Ok(Some(record))
    }

    /// Find the unit behind a point-to-point link and bind the driver to it
    ///
    /// # Errors
    ///
    /// Returns `AddressNotFound` if no address in 1..=44 answered
    pub async fn discover_unit_address(&mut self) -> Result<u8> {
        info!("Scanning {} for a control unit", self.transport.describe());

        let found = discovery::discover(&mut self.transport, self.options.read_timeout).await?;
        let Some(address) = found else {
            error!("No control unit answered on {}", self.transport.describe());
            return Err(AfarError::AddressNotFound {
                first: *DISCOVERY_RANGE.start(),
                last: *DISCOVERY_RANGE.end(),
            });
        };

        if self.options.mode == AddressingMode::PointToPoint {
            self.options.unit_address = Some(address);
        }
        Ok(address)
    }

    fn state_of(&self, unit: u8) -> UnitState {
        self.units
            .get(&unit)
            .cloned()
            .unwrap_or_else(|| UnitState::new(self.options.mode))
    }

    async fn push_state(&mut self, unit: u8, state: UnitState) -> Result<()> {
        self.send(unit, commands::ppm_switch(&state)).await?;
        self.units.insert(unit, state);
        Ok(())
    }

    /// Element switching needs a concrete unit, not the broadcast address
    fn check_switch_target(&self, unit: u8) -> Result<()> {
        if self.options.mode == AddressingMode::Bus && unit == 0 {
            return Err(AfarError::invalid(format!(
                "element switching needs a unit address 1-{}",
                MAX_BUS_ADDRESS
            )));
        }
        Ok(())
    }

    /// Address written into the frame for `unit`
    fn resolve_address(&self, unit: u8) -> Result<u8> {
        match self.options.mode {
            AddressingMode::Bus => {
                if unit > MAX_BUS_ADDRESS {
                    return Err(FrameError::InvalidAddress(unit).into());
                }
                Ok(unit)
            }
            AddressingMode::PointToPoint => match self.options.unit_address {
                Some(bound) if bound == unit => Ok(unit),
                Some(bound) => Err(AfarError::invalid(format!(
                    "link is bound to BU#{}, not BU#{}",
                    bound, unit
                ))),
                None => Err(AfarError::invalid(
                    "point-to-point link has no unit address; run discovery first",
                )),
            },
        }
    }

    fn frame_bytes(&mut self, unit: u8, command: Command) -> Result<Vec<u8>> {
        let address = self.resolve_address(unit)?;
        let id = match self.options.mode {
            AddressingMode::Bus => self.counter.next_id(),
            AddressingMode::PointToPoint => 0,
        };
        let frame = command.into_frame(address, id)?;
        Ok(encode_frame(self.options.mode, &frame)?)
    }

    async fn write_command(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.options.write_delay.is_zero() {
            tokio::time::sleep(self.options.write_delay).await;
        }
        self.transport.write_all(bytes).await
    }

    /// Deliver one command, running the acknowledgment cycle where the link
    /// has one
    async fn send(&mut self, unit: u8, command: Command) -> Result<()> {
        let code = command.code;
        let address = self.resolve_address(unit)?;
        let bytes = self.frame_bytes(unit, command)?;

        if !self.options.mode.acknowledges() {
            self.phase = LinkPhase::Sending;
            let result = self.write_command(&bytes).await;
            self.phase = LinkPhase::Idle;
            return result;
        }

        let probe = self.frame_bytes(unit, commands::status_probe())?;
        let result = self.deliver(unit, address, code, &bytes, &probe).await;
        self.phase = LinkPhase::Idle;
        if result.is_err() {
            self.retry.reset();
        }
        result
    }

    async fn deliver(
        &mut self,
        unit: u8,
        address: u8,
        code: u8,
        command: &[u8],
        probe: &[u8],
    ) -> Result<()> {
        loop {
            self.phase = LinkPhase::Sending;
            self.write_command(command).await?;

            self.phase = LinkPhase::AwaitingAck;
            self.transport.write_all(probe).await?;
            let reply = self.transport.read_reply(self.options.read_timeout).await?;

            let outcome = ack::classify(self.options.mode, &reply, address);
            match self.retry.record(outcome) {
                AckStatus::Acked => {
                    debug!("BU#{}. Command 0x{:02X} acknowledged", unit, code);
                    return Ok(());
                }
                AckStatus::NackRetryable(reason) => {
                    warn!(
                        "BU#{}. Command 0x{:02X} not acknowledged ({}), attempt {} of {}",
                        unit,
                        code,
                        reason,
                        self.retry.attempts(),
                        self.retry.max_attempts()
                    );
                }
                AckStatus::NackFatal(reason) => {
                    let attempts = self.retry.max_attempts();
                    error!(
                        "BU#{}. Command 0x{:02X} failed after {} attempts ({})",
                        unit, code, attempts, reason
                    );
                    return Err(AfarError::NotDelivered {
                        unit,
                        code,
                        attempts,
                        last: reason,
                    });
                }
            }
        }
    }
}
