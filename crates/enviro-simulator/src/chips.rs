//! Register-level models of the supported chips
//!
//! Each model answers the same byte protocol as the real part and converts the
//! current [`Ambient`] conditions into raw words with the inverse of the
//! datasheet formula. Conversions finish instantly apart from the MPL3115A2,
//! which keeps its data-ready flag low for a few status polls after every
//! read so the ready-poll path gets exercised.

use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};

use crate::ambient::Ambient;
use crate::bus::{Device, RegisterFile};

const NACK_DATA: ErrorKind = ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data);

fn clamp_u16(value: f64) -> u16 {
    value.round().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// CRC-8, polynomial x^8 + x^5 + x^4 + 1, as appended by the SHT21.
fn sht21_crc(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |mut crc, &byte| {
        crc ^= byte;
        for _ in 0..8 {
            crc = if crc & 0x80 != 0 {
                (crc << 1) ^ 0x31
            } else {
                crc << 1
            };
        }
        crc
    })
}

pub struct Sht21Model {
    ambient: Ambient,
    user_register: u8,
    response: Vec<u8>,
}

impl Sht21Model {
    const USER_REGISTER_RESET: u8 = 0x02;

    pub fn new(ambient: Ambient) -> Self {
        Self {
            ambient,
            user_register: Self::USER_REGISTER_RESET,
            response: Vec::new(),
        }
    }

    fn measurement(raw: u16) -> Vec<u8> {
        let [msb, lsb] = raw.to_be_bytes();
        vec![msb, lsb, sht21_crc(&[msb, lsb])]
    }
}

impl Device for Sht21Model {
    fn address(&self) -> u8 {
        0x40
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        let conditions = self.ambient.now();
        self.response = match bytes {
            [0xFE] => {
                self.user_register = Self::USER_REGISTER_RESET;
                Vec::new()
            }
            [0xE7] => vec![self.user_register],
            [0xE6, value] => {
                self.user_register = *value;
                Vec::new()
            }
            [0xE3] => {
                let raw = clamp_u16((conditions.temperature + 46.85) * 65536.0 / 175.72);
                Self::measurement(raw & !0x0003)
            }
            [0xE5] => {
                let raw = clamp_u16((conditions.humidity + 6.0) * 65536.0 / 125.0);
                // Status bit 1 marks a humidity word.
                Self::measurement((raw & !0x0003) | 0x0002)
            }
            _ => return Err(NACK_DATA),
        };
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), ErrorKind> {
        for (i, byte) in buffer.iter_mut().enumerate() {
            *byte = self.response.get(i).copied().unwrap_or(0xFF);
        }
        Ok(())
    }
}

pub struct Hdc2010Model {
    ambient: Ambient,
    file: RegisterFile,
}

impl Hdc2010Model {
    const RESET_DRDY_INT_CONF: u8 = 0x0E;
    const MEASUREMENT_CONF: u8 = 0x0F;

    pub fn new(ambient: Ambient) -> Self {
        Self {
            ambient,
            file: RegisterFile::new(),
        }
    }

    fn convert(&mut self) {
        let conditions = self.ambient.now();
        let temperature = clamp_u16((conditions.temperature + 40.0) * 65536.0 / 165.0);
        let humidity = clamp_u16(conditions.humidity * 65536.0 / 100.0);
        self.file.registers[0x00..0x02].copy_from_slice(&temperature.to_le_bytes());
        self.file.registers[0x02..0x04].copy_from_slice(&humidity.to_le_bytes());
    }
}

impl Device for Hdc2010Model {
    fn address(&self) -> u8 {
        0x40
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        let Some((&pointer, data)) = bytes.split_first() else {
            return Err(NACK_DATA);
        };
        self.file.pointer = pointer;

        for &value in data {
            match self.file.pointer {
                Self::RESET_DRDY_INT_CONF if value & 0x80 != 0 => {
                    self.file.registers = [0; 256];
                }
                Self::MEASUREMENT_CONF if value & 0x01 != 0 => {
                    self.file.registers[Self::MEASUREMENT_CONF as usize] = value & !0x01;
                    self.convert();
                }
                register => self.file.registers[register as usize] = value,
            }
            self.file.pointer = self.file.pointer.wrapping_add(1);
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), ErrorKind> {
        self.file.read(buffer);
        Ok(())
    }
}

pub struct Mpl3115a2Model {
    ambient: Ambient,
    file: RegisterFile,
    polls_until_ready: u8,
}

impl Mpl3115a2Model {
    const STATUS: u8 = 0x00;
    const OUT_P_MSB: u8 = 0x01;
    const WHO_AM_I: u8 = 0x0C;
    const CTRL_REG1: u8 = 0x26;
    const CONVERSION_POLLS: u8 = 2;

    pub fn new(ambient: Ambient) -> Self {
        let mut file = RegisterFile::new();
        file.registers[Self::WHO_AM_I as usize] = 0xC4;
        Self {
            ambient,
            file,
            polls_until_ready: Self::CONVERSION_POLLS,
        }
    }

    fn active(&self) -> bool {
        self.file.registers[Self::CTRL_REG1 as usize] & 0x01 != 0
    }
}

impl Device for Mpl3115a2Model {
    fn address(&self) -> u8 {
        0x60
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        let Some((&pointer, data)) = bytes.split_first() else {
            return Err(NACK_DATA);
        };
        self.file.pointer = pointer;
        for &value in data {
            self.file.registers[self.file.pointer as usize] = value;
            self.file.pointer = self.file.pointer.wrapping_add(1);
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), ErrorKind> {
        match self.file.pointer {
            Self::STATUS => {
                let ready = self.active() && self.polls_until_ready == 0;
                self.polls_until_ready = self.polls_until_ready.saturating_sub(1);
                self.file.registers[Self::STATUS as usize] = if ready { 0x0E } else { 0x00 };
            }
            Self::OUT_P_MSB => {
                let raw = (self.ambient.now().pressure * 4.0).round() as u32;
                let [_, msb, csb, lsb] = (raw << 4).to_be_bytes();
                self.file.registers[0x01..0x04].copy_from_slice(&[msb, csb, lsb]);
                self.polls_until_ready = Self::CONVERSION_POLLS;
            }
            _ => {}
        }
        self.file.read(buffer);
        Ok(())
    }
}

pub struct Tsl2561Model {
    ambient: Ambient,
    file: RegisterFile,
}

impl Tsl2561Model {
    const COMMAND: u8 = 0x80;
    const CONTROL: u8 = 0x00;
    const TIMING: u8 = 0x01;
    const ID: u8 = 0x0A;
    const DATA0_LOW: u8 = 0x0C;
    /// IR share of the broadband channel
    const IR_FRACTION: f64 = 0.1;

    pub fn new(ambient: Ambient) -> Self {
        let mut file = RegisterFile::new();
        file.registers[Self::ID as usize] = 0x50;
        file.registers[Self::TIMING as usize] = 0x02;
        Self { ambient, file }
    }

    fn powered(&self) -> bool {
        self.file.registers[Self::CONTROL as usize] & 0x03 == 0x03
    }

    /// Counts per unit of normalised channel value. 1× gain collects a
    /// sixteenth of the 16× counts.
    fn channel_scale(&self) -> f64 {
        let timing = self.file.registers[Self::TIMING as usize];
        let scale = match timing & 0x03 {
            0b00 => 0x7517,
            0b01 => 0x0FE7,
            _ => 1 << 10,
        };
        let gain = if timing & 0x10 != 0 { 1 } else { 16 };
        f64::from(scale * gain) / 1024.0
    }

    fn integrate(&mut self) {
        let (ch0, ch1) = if self.powered() {
            // First coefficient band: lux ≈ ch0 * (B - r*M) / 2^14
            let per_count = (f64::from(0x01F2) - Self::IR_FRACTION * f64::from(0x01BE)) / 16384.0;
            let ch0 = self.ambient.now().illuminance / per_count / self.channel_scale();
            (clamp_u16(ch0), clamp_u16(ch0 * Self::IR_FRACTION))
        } else {
            (0, 0)
        };
        let start = Self::DATA0_LOW as usize;
        self.file.registers[start..start + 2].copy_from_slice(&ch0.to_le_bytes());
        self.file.registers[start + 2..start + 4].copy_from_slice(&ch1.to_le_bytes());
    }
}

impl Device for Tsl2561Model {
    fn address(&self) -> u8 {
        0x39
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        let Some((&command, data)) = bytes.split_first() else {
            return Err(NACK_DATA);
        };
        if command & Self::COMMAND == 0 {
            return Err(NACK_DATA);
        }
        self.file.pointer = command & 0x0F;
        if let Some(&value) = data.first() {
            if self.file.pointer != Self::ID {
                self.file.registers[self.file.pointer as usize] = value;
            }
        }
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<(), ErrorKind> {
        if self.file.pointer == Self::DATA0_LOW {
            self.integrate();
        }
        self.file.read(buffer);
        Ok(())
    }
}
