//! Register write side effects
//!
//! [`SoundEngine::write_register`] decodes one CPU write into channel state
//! changes, commits the affected parameters to the shared block and emits
//! the matching message.
//!
//! The host is expected to store the value in its own register file before
//! calling in; triggers and resyncs read neighbouring registers back.

use super::channel::{ChannelMask, Direction, CHANNEL_COUNT};
use super::registers::{
    Register, ENVELOPE_REGISTERS, LENGTH_ENABLE_BIT, MASTER_ENABLE_BIT, NR30, NR52,
    TRIGGER_BIT, TRIGGER_REGISTERS, WAVE_DAC_BIT,
};
use super::wave::convert_sample;
use crate::constants::{REGISTER_FIRST, REGISTER_LAST, SHORT_LENGTH_MAX, WAVE_LENGTH_MAX};
use crate::engine::SoundEngine;
use crate::host::SoundHost;
use crate::sync::Message;
use log::{debug, trace};

/// NR32 output level code to channel volume
const WAVE_LEVELS: [u8; 4] = [0, 15, 7, 3];

/// Index of the wave channel
const WAVE_CHANNEL: usize = 2;

/// Index of the noise channel
const NOISE_CHANNEL: usize = 3;

impl SoundEngine {
    /// Apply a CPU write to sound register `addr` (offset from `0xFF00`)
    ///
    /// Writes to unmapped offsets are ignored. Other registers are read back
    /// from `host` as needed, so store `value` there first; only an NR52
    /// write is applied from `value` alone.
    pub fn write_register<H: SoundHost + ?Sized>(&mut self, host: &mut H, addr: u8, value: u8) {
        match Register::from_addr(addr) {
            Some(register) => self.apply(host, register, value),
            None => trace!("Ignoring write 0x{value:02X} to unmapped offset 0x{addr:02X}"),
        }
    }

    fn apply<H: SoundHost + ?Sized>(&mut self, host: &mut H, register: Register, value: u8) {
        match register {
            Register::Ch1Sweep => self.write_sweep(value),
            Register::Ch1LengthDuty => self.write_length_duty(&*host, 0, value),
            Register::Ch2LengthDuty => self.write_length_duty(&*host, 1, value),
            Register::Ch1Envelope => self.write_envelope(&*host, 0, value),
            Register::Ch2Envelope => self.write_envelope(&*host, 1, value),
            Register::Ch4Envelope => self.write_envelope(&*host, NOISE_CHANNEL, value),
            Register::Ch1FreqLo => self.write_frequency_low(&*host, 0, value),
            Register::Ch2FreqLo => self.write_frequency_low(&*host, 1, value),
            Register::Ch3FreqLo => self.write_frequency_low(&*host, WAVE_CHANNEL, value),
            Register::Ch1FreqHi => self.write_frequency_high(host, 0, value),
            Register::Ch2FreqHi => self.write_frequency_high(host, 1, value),
            Register::Ch3FreqHi => self.write_frequency_high(host, WAVE_CHANNEL, value),
            Register::Ch3Enable => {
                if value & WAVE_DAC_BIT == 0 {
                    self.link.target().disable_channels(ChannelMask::CH3);
                    self.emit(&*host, Message::update(WAVE_CHANNEL));
                }
            }
            Register::Ch3Length => {
                self.channels[WAVE_CHANNEL].length = value;
                self.reload_length(WAVE_CHANNEL);
            }
            Register::Ch3Level => {
                self.channels[WAVE_CHANNEL].volume = WAVE_LEVELS[usize::from((value >> 5) & 0x03)];
                self.send_volume(&*host, WAVE_CHANNEL);
            }
            Register::Ch4Length => {
                self.channels[NOISE_CHANNEL].length = value & 0x3F;
                self.reload_length(NOISE_CHANNEL);
            }
            Register::Ch4Polynomial => self.write_polynomial(&*host, value),
            Register::Ch4Control => {
                self.channels[NOISE_CHANNEL].length_enabled = value & LENGTH_ENABLE_BIT != 0;
                if value & TRIGGER_BIT != 0 {
                    self.trigger(&*host, NOISE_CHANNEL);
                } else {
                    self.request_length(NOISE_CHANNEL);
                }
            }
            Register::MasterVolume => {
                let target = self.link.target();
                let previous = target.vol_control();
                target.set_vol_control(value);
                if (previous ^ value) & 0x07 != 0 {
                    self.emit(&*host, Message::master_volume());
                }
            }
            Register::Routing => {
                self.link.target().set_chan_output(value);
                for index in 0..CHANNEL_COUNT {
                    self.commit_pan(index);
                }
                self.emit(&*host, Message::update_all());
                self.emit(&*host, Message::master_volume());
            }
            Register::MasterEnable => self.write_master_enable(host, value),
            Register::WaveRam(index) => {
                // Resync reconverts from the host once re-attached
                if self.link.is_attached() {
                    convert_sample(&self.wave, &self.samples, usize::from(index), value);
                }
            }
        }
    }

    fn write_sweep(&mut self, value: u8) {
        self.sweep.time = (value >> 4) & 0x07;
        self.sweep.direction = if value & 0x08 != 0 {
            Direction::Down
        } else {
            Direction::Up
        };
        self.sweep.shift = value & 0x07;
        if self.sweep.time != 0 {
            self.sweep.counter = self.sweep.period_cycles(self.config.clock_speed);
            self.scheduler.request(self.sweep.counter);
        }
    }

    fn write_length_duty<H: SoundHost + ?Sized>(&mut self, host: &H, index: usize, value: u8) {
        self.channels[index].length = value & 0x3F;
        self.reload_length(index);
        self.link.target().set_duty(index, value >> 6);
        self.emit(host, Message::update(index));
    }

    fn write_envelope<H: SoundHost + ?Sized>(&mut self, host: &H, index: usize, value: u8) {
        self.channels[index].set_envelope_register(value);
        self.send_volume(host, index);
    }

    fn write_frequency_low<H: SoundHost + ?Sized>(&mut self, host: &H, index: usize, value: u8) {
        let channel = &mut self.channels[index];
        channel.frequency = (channel.frequency & 0x0700) | u16::from(value);
        self.commit_frequency(index);
        self.emit(host, Message::update(index));
    }

    fn write_frequency_high<H: SoundHost + ?Sized>(
        &mut self,
        host: &mut H,
        index: usize,
        value: u8,
    ) {
        let channel = &mut self.channels[index];
        channel.frequency = (channel.frequency & 0x00FF) | (u16::from(value & 0x07) << 8);
        channel.length_enabled = value & LENGTH_ENABLE_BIT != 0;
        self.commit_frequency(index);

        if value & TRIGGER_BIT == 0 {
            self.request_length(index);
            self.emit(&*host, Message::update(index));
        } else if index == WAVE_CHANNEL && host.read_io(NR30) & WAVE_DAC_BIT == 0 {
            self.emit(&*host, Message::update(index));
        } else {
            self.trigger(&*host, index);
        }
    }

    fn write_polynomial<H: SoundHost + ?Sized>(&mut self, host: &H, value: u8) {
        self.channels[NOISE_CHANNEL].frequency = u16::from(value >> 4);
        self.noise.divisor_code = value & 0x07;
        self.noise.narrow = value & 0x08 != 0;
        self.link.target().set_noise_narrow(self.noise.narrow);
        self.commit_frequency(NOISE_CHANNEL);
        self.emit(host, Message::update(NOISE_CHANNEL));
    }

    fn write_master_enable<H: SoundHost + ?Sized>(&mut self, host: &mut H, value: u8) {
        if value & MASTER_ENABLE_BIT == 0 {
            let previous = self.link.target().take_channels_on();
            if self.master_enabled {
                debug!("Sound master disabled, saved {previous:?}");
                self.master_enabled = false;
                self.resume_mask = previous;
                self.emit(&*host, Message::update_all());
            }
        } else if !self.master_enabled {
            self.master_enabled = true;
            let mask = std::mem::take(&mut self.resume_mask);
            debug!("Sound master enabled, resuming {mask:?}");
            self.resync(host, value, mask);
        }
    }

    /// Restart a channel from its current registers
    fn trigger<H: SoundHost + ?Sized>(&mut self, host: &H, index: usize) {
        let clock_speed = self.config.clock_speed;
        self.reload_length(index);

        let channel = &mut self.channels[index];
        if let Some(envelope_register) = ENVELOPE_REGISTERS[index] {
            channel.volume = host.read_io(envelope_register) >> 4;
            channel.envelope.counter = channel.envelope.period_cycles(clock_speed);
            if channel.envelope.period != 0 {
                self.scheduler.request(channel.envelope.counter);
            }
        }

        if index == 0 && self.sweep.time != 0 {
            self.sweep.counter = self.sweep.period_cycles(clock_speed);
            self.scheduler.request(self.sweep.counter);
        }

        self.link.target().enable_channels(ChannelMask::channel(index));
        self.commit_volume(index);
        self.emit(host, Message::start(index));
    }

    /// Reapply every register from the host, then re-trigger `mask`
    ///
    /// `status` is replayed as NR52 first so the master state is settled
    /// before anything else. Trigger bits are stripped during the replay.
    pub(crate) fn resync<H: SoundHost + ?Sized>(
        &mut self,
        host: &mut H,
        status: u8,
        mask: ChannelMask,
    ) {
        self.write_register(host, NR52, status);

        for addr in REGISTER_FIRST..=REGISTER_LAST {
            if addr == NR52 {
                continue;
            }
            let mut value = host.read_io(addr);
            if TRIGGER_REGISTERS.contains(&addr) {
                value &= !TRIGGER_BIT;
            }
            self.write_register(host, addr, value);
        }

        if !self.master_enabled {
            return;
        }
        for (index, &addr) in TRIGGER_REGISTERS.iter().enumerate() {
            if mask.contains(ChannelMask::channel(index)) {
                let value = host.read_io(addr) | TRIGGER_BIT;
                self.write_register(host, addr, value);
            }
        }
    }

    fn reload_length(&mut self, index: usize) {
        let max_length = if index == WAVE_CHANNEL {
            WAVE_LENGTH_MAX
        } else {
            SHORT_LENGTH_MAX
        };
        self.channels[index].reload_length(max_length, self.config.clock_speed);
        self.request_length(index);
    }

    fn request_length(&mut self, index: usize) {
        let channel = &self.channels[index];
        if channel.length_enabled {
            self.scheduler.request(channel.length_counter);
        }
    }

    fn send_volume<H: SoundHost + ?Sized>(&mut self, host: &H, index: usize) {
        if self.commit_volume(index) {
            self.emit(host, Message::volume(index));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::constants::{DMG_CLOCK_HZ, PAN_CENTER, PAN_SILENT};
    use crate::host::RegisterFile;
    use crate::sync::RenderPort;

    fn engine() -> (SoundEngine, RenderPort, RegisterFile) {
        let (mut engine, port) = SoundEngine::new(EngineConfig::default()).unwrap();
        let mut io = RegisterFile::new();
        io.write(NR52, 0x80);
        engine.init(&mut io);
        port.drain();
        (engine, port, io)
    }

    fn write(engine: &mut SoundEngine, io: &mut RegisterFile, addr: u8, value: u8) {
        io.write(addr, value);
        engine.write_register(io, addr, value);
    }

    #[test]
    fn test_trigger_starts_channel() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x14, 0x80);

        assert!(engine.shared().is_on(0));
        assert_eq!(engine.channels[0].length_counter, (64 * DMG_CLOCK_HZ / 256) as i32);
        assert_eq!(port.drain(), vec![Message::start(0)]);
    }

    #[test]
    fn test_trigger_loads_volume_from_envelope_register() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x17, 0xA3);
        // Channel off: no volume commit yet
        assert_eq!(engine.shared().volume(1), 0);
        assert!(port.try_recv().is_none());

        write(&mut engine, &mut io, 0x19, 0x80);
        assert_eq!(engine.shared().volume(1), 0x0A);
        assert_eq!(engine.channels[1].envelope.counter, 3 * (DMG_CLOCK_HZ / 64) as i32);
        assert_eq!(engine.required_next_event_cycles(), 3 * (DMG_CLOCK_HZ / 64) as i32);
    }

    #[test]
    fn test_envelope_write_on_running_channel_sends_volume() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x12, 0x80);
        write(&mut engine, &mut io, 0x14, 0x80);
        port.drain();

        write(&mut engine, &mut io, 0x12, 0x40);
        assert_eq!(engine.shared().volume(0), 4);
        assert_eq!(port.drain(), vec![Message::volume(0)]);

        // Same volume again: nothing to report
        write(&mut engine, &mut io, 0x12, 0x41);
        assert!(port.try_recv().is_none());
    }

    #[test]
    fn test_frequency_writes_commit_hz() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x18, 0xFF);
        write(&mut engine, &mut io, 0x19, 0x07);
        assert_eq!(engine.channels[1].frequency, 0x7FF);
        assert_eq!(engine.shared().frequency(1), 131_072 * 8);
        assert_eq!(port.drain(), vec![Message::update(1), Message::update(1)]);
    }

    #[test]
    fn test_length_duty_write() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x11, 0b1011_1110);
        assert_eq!(engine.channels[0].length, 0x3E);
        assert_eq!(engine.channels[0].length_counter, (2 * DMG_CLOCK_HZ / 256) as i32);
        assert_eq!(engine.shared().duty(0), 0b10);
        assert_eq!(port.drain(), vec![Message::update(0)]);
    }

    #[test]
    fn test_length_enable_requests_next_event() {
        let (mut engine, _port, mut io) = engine();
        write(&mut engine, &mut io, 0x20, 0x3F);
        assert_eq!(engine.required_next_event_cycles(), i32::MAX);
        write(&mut engine, &mut io, 0x23, 0x40);
        assert_eq!(engine.required_next_event_cycles(), (DMG_CLOCK_HZ / 256) as i32);
    }

    #[test]
    fn test_wave_trigger_gated_by_dac() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x1E, 0x80);
        assert!(!engine.shared().is_on(2));
        assert_eq!(port.drain(), vec![Message::update(2)]);

        write(&mut engine, &mut io, 0x1A, 0x80);
        write(&mut engine, &mut io, 0x1E, 0x80);
        assert!(engine.shared().is_on(2));
        assert_eq!(engine.channels[2].length_counter, (256 * DMG_CLOCK_HZ / 256) as i32);
        assert_eq!(port.drain(), vec![Message::start(2)]);

        write(&mut engine, &mut io, 0x1A, 0x00);
        assert!(!engine.shared().is_on(2));
        assert_eq!(port.drain(), vec![Message::update(2)]);
    }

    #[test]
    fn test_wave_level_codes() {
        let (mut engine, _port, mut io) = engine();
        for (code, volume) in [(0u8, 0u8), (1, 15), (2, 7), (3, 3)] {
            write(&mut engine, &mut io, 0x1C, code << 5);
            assert_eq!(engine.channels[2].volume, volume);
        }
    }

    #[test]
    fn test_noise_polynomial() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x22, 0x3A);
        assert_eq!(engine.channels[3].frequency, 3);
        assert_eq!(engine.noise.divisor_code, 2);
        assert!(engine.shared().noise_narrow());
        assert_eq!(engine.shared().frequency(3), (524_288 / 2) >> 4);
        assert_eq!(port.drain(), vec![Message::update(3)]);
    }

    #[test]
    fn test_master_volume_only_reports_low_bits() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x24, 0x70);
        assert!(port.try_recv().is_none());
        assert_eq!(engine.shared().vol_control(), 0x70);

        write(&mut engine, &mut io, 0x24, 0x77);
        assert_eq!(port.drain(), vec![Message::master_volume()]);
    }

    #[test]
    fn test_routing_updates_pans() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x25, 0x11);
        assert_eq!(engine.shared().pan(0), PAN_CENTER);
        assert_eq!(engine.shared().pan(1), PAN_SILENT);
        assert_eq!(
            port.drain(),
            vec![Message::update_all(), Message::master_volume()]
        );
    }

    #[test]
    fn test_wave_ram_write_converts() {
        let (mut engine, _port, mut io) = engine();
        write(&mut engine, &mut io, 0x31, 0xF0);
        let samples = engine.shared().samples().unwrap();
        assert_eq!(samples.get(2), 112);
        assert_eq!(samples.get(3), -112);
    }

    #[test]
    fn test_sweep_register_decoding() {
        let (mut engine, _port, mut io) = engine();
        write(&mut engine, &mut io, 0x10, 0x29);
        assert_eq!(engine.sweep.time, 2);
        assert_eq!(engine.sweep.direction, Direction::Down);
        assert_eq!(engine.sweep.shift, 1);
        assert_eq!(engine.sweep.counter, (DMG_CLOCK_HZ / 64) as i32);
        assert_eq!(engine.required_next_event_cycles(), (DMG_CLOCK_HZ / 64) as i32);
    }

    #[test]
    fn test_unmapped_write_is_ignored() {
        let (mut engine, port, mut io) = engine();
        let before = engine.shared().snapshot();
        write(&mut engine, &mut io, 0x15, 0xFF);
        write(&mut engine, &mut io, 0x2A, 0xFF);
        assert_eq!(engine.shared().snapshot(), before);
        assert!(port.try_recv().is_none());
    }

    #[test]
    fn test_master_disable_is_idempotent() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x14, 0x80);
        port.drain();

        write(&mut engine, &mut io, NR52, 0x00);
        assert!(engine.shared().channels_on().is_empty());
        assert_eq!(port.drain(), vec![Message::update_all()]);

        write(&mut engine, &mut io, NR52, 0x00);
        assert!(port.try_recv().is_none());
        assert_eq!(engine.resume_mask, ChannelMask::CH1);
    }

    #[test]
    fn test_master_enable_uses_written_value() {
        let (mut engine, port, mut io) = engine();
        write(&mut engine, &mut io, 0x12, 0xF0);
        write(&mut engine, &mut io, 0x14, 0x80);
        write(&mut engine, &mut io, NR52, 0x00);
        port.drain();

        // Host still holds the stale 0x00 in NR52
        engine.write_register(&mut io, NR52, 0x80);

        assert!(engine.master_enabled);
        assert_eq!(engine.shared().channels_on(), ChannelMask::CH1);
        assert!(port.drain().contains(&Message::start(0)));
    }
}
