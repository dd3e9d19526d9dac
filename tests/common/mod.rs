//! In-memory AUXSPI save chip emulator for testing.
#![allow(dead_code)]

use auxspi_save::{AuxSpi, Clock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseKind {
    Full,
    Lite,
}

/// One chip select window as seen by the chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub bytes: Vec<u8>,
    pub reads: usize,
    pub close: CloseKind,
    /// The infrared disable sequence ran right before this transaction
    pub ir_gated: bool,
}

impl Transaction {
    pub fn command(&self) -> Option<u8> {
        self.bytes.first().copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimKind {
    SmallEeprom,
    LargeEeprom,
    Flash,
    Garbage,
}

/// Emulates the three save chip families behind AUXSPI
pub struct SimChip {
    pub kind: SimKind,
    pub memory: Vec<u8>,
    pub idle_status: u8,
    pub jedec: [u8; 3],
    /// Number of status polls reporting WIP after each program or erase
    pub busy_polls: u32,
    pub stuck_busy: bool,
    pub transactions: Vec<Transaction>,
    pub ir_disables: usize,
    pub erased: Vec<u32>,

    write_enabled: bool,
    busy_left: u32,
    current: Option<Transaction>,
    infrared_phase: bool,
    ir_pending: bool,
    addr: u32,
    addr_len: usize,
    jedec_pos: usize,
}

impl SimChip {
    fn new(kind: SimKind, size: usize, fill: u8, idle_status: u8, jedec: [u8; 3]) -> Self {
        Self {
            kind,
            memory: vec![fill; size],
            idle_status,
            jedec,
            busy_polls: 2,
            stuck_busy: false,
            transactions: Vec::new(),
            ir_disables: 0,
            erased: Vec::new(),
            write_enabled: false,
            busy_left: 0,
            current: None,
            infrared_phase: false,
            ir_pending: false,
            addr: 0,
            addr_len: 0,
            jedec_pos: 0,
        }
    }

    /// 512 byte EEPROM
    pub fn small_eeprom() -> Self {
        Self::new(SimKind::SmallEeprom, 512, 0xFF, 0xF0, [0xFF; 3])
    }

    /// 16 bit EEPROM/FRAM of `size` bytes, smaller parts mirror their content
    pub fn large_eeprom(size: usize) -> Self {
        Self::new(SimKind::LargeEeprom, size, 0xFF, 0x00, [0xFF; 3])
    }

    pub fn flash(jedec: u32, size: usize) -> Self {
        let id = [(jedec >> 16) as u8, (jedec >> 8) as u8, jedec as u8];
        Self::new(SimKind::Flash, size, 0xFF, 0x00, id)
    }

    /// Something answering with a status no family uses
    pub fn garbage() -> Self {
        Self::new(SimKind::Garbage, 16, 0xFF, 0xFF, [0xFF; 3])
    }

    fn address_bytes(&self) -> usize {
        match self.kind {
            SimKind::SmallEeprom => 1,
            SimKind::LargeEeprom => 2,
            SimKind::Flash => 3,
            SimKind::Garbage => 0,
        }
    }

    fn mask(&self) -> usize {
        self.memory.len() - 1
    }

    /// Instruction with the small EEPROM address bit removed
    fn base_command(&self, cmd: u8) -> u8 {
        if self.kind == SimKind::SmallEeprom && matches!(cmd & !0x08, 0x02 | 0x03) {
            cmd & !0x08
        } else {
            cmd
        }
    }

    fn status(&mut self) -> u8 {
        let mut status = self.idle_status;
        if self.write_enabled {
            status |= 0x02;
        }
        if self.stuck_busy {
            status |= 0x01;
        } else if self.busy_left > 0 {
            self.busy_left -= 1;
            status |= 0x01;
        }
        status
    }

    /// Transactions without the status polls and write enables
    pub fn data_transactions(&self) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| !matches!(t.command(), Some(0x05) | Some(0x06)))
            .collect()
    }

    /// Write instructions as (address, payload length)
    pub fn writes(&self) -> Vec<(u32, usize)> {
        let addr_len = self.address_bytes();
        self.transactions
            .iter()
            .filter(|t| {
                t.command()
                    .map(|cmd| self.base_command(cmd) == 0x02)
                    .unwrap_or(false)
            })
            .map(|t| {
                let mut addr = 0u32;
                for byte in &t.bytes[1..=addr_len] {
                    addr = addr << 8 | *byte as u32;
                }
                if self.kind == SimKind::SmallEeprom {
                    addr |= ((t.bytes[0] >> 3) as u32 & 1) << 8;
                }
                (addr, t.bytes.len() - 1 - addr_len)
            })
            .collect()
    }

    pub fn clear_log(&mut self) {
        self.transactions.clear();
        self.erased.clear();
        self.ir_disables = 0;
    }

    fn end(&mut self, close: CloseKind) {
        let Some(mut transaction) = self.current.take() else {
            return;
        };
        transaction.close = close;
        match transaction.command().map(|cmd| self.base_command(cmd)) {
            Some(0x02) if self.write_enabled => {
                self.write_enabled = false;
                self.busy_left = self.busy_polls;
            }
            Some(0xD8) if self.write_enabled && transaction.bytes.len() == 4 => {
                let sector = (transaction.bytes[1] as usize) << 16;
                let end = (sector + 0x10000).min(self.memory.len());
                if sector < self.memory.len() {
                    self.memory[sector..end].fill(0xFF);
                }
                self.erased.push(u32::from(transaction.bytes[1]));
                self.write_enabled = false;
                self.busy_left = self.busy_polls;
            }
            _ => {}
        }
        self.transactions.push(transaction);
    }
}

impl AuxSpi for SimChip {
    type Error = core::convert::Infallible;

    fn open(&mut self, clock: Clock) -> Result<(), Self::Error> {
        // A reopen while selected drops the partial transaction, as the IR sequence does
        self.current = None;
        self.infrared_phase = clock == Clock::Mhz1;
        if !self.infrared_phase {
            self.current = Some(Transaction {
                bytes: Vec::new(),
                reads: 0,
                close: CloseKind::Full,
                ir_gated: self.ir_pending,
            });
            self.ir_pending = false;
            self.addr = 0;
            self.addr_len = 0;
            self.jedec_pos = 0;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        self.end(CloseKind::Full);
        Ok(())
    }

    fn close_lite(&mut self) -> Result<(), Self::Error> {
        self.end(CloseKind::Lite);
        Ok(())
    }

    fn write_byte(&mut self, value: u8) -> Result<(), Self::Error> {
        if self.infrared_phase {
            if value == 0x00 {
                self.ir_disables += 1;
                self.ir_pending = true;
            }
            return Ok(());
        }
        let addr_bytes = self.address_bytes();
        let mask = self.mask();
        let flash = self.kind == SimKind::Flash;
        let Some(transaction) = self.current.as_mut() else {
            return Ok(());
        };
        transaction.bytes.push(value);
        if transaction.bytes.len() == 1 {
            if value == 0x06 {
                self.write_enabled = true;
            }
            if self.kind == SimKind::SmallEeprom {
                self.addr = ((value >> 3) as u32 & 1) << 8;
            }
            return Ok(());
        }
        let cmd = transaction.bytes[0];
        if self.addr_len < addr_bytes {
            self.addr = if self.kind == SimKind::SmallEeprom {
                (self.addr & 0x100) | value as u32
            } else {
                self.addr << 8 | value as u32
            };
            self.addr_len += 1;
            return Ok(());
        }
        if self.base_command(cmd) == 0x02 && self.write_enabled {
            let cell = self.addr as usize & mask;
            if flash {
                self.memory[cell] &= value;
            } else {
                self.memory[cell] = value;
            }
            self.addr = self.addr.wrapping_add(1);
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let cmd = match self.current.as_ref().and_then(|t| t.command()) {
            Some(cmd) => self.base_command(cmd),
            None => return Ok(0xFF),
        };
        if let Some(transaction) = self.current.as_mut() {
            transaction.reads += 1;
        }
        let value = match cmd {
            0x9F => {
                let value = self.jedec.get(self.jedec_pos).copied().unwrap_or(0xFF);
                self.jedec_pos += 1;
                value
            }
            0x05 => self.status(),
            0x03 if self.addr_len == self.address_bytes() && self.kind != SimKind::Garbage => {
                let value = self.memory[self.addr as usize & self.mask()];
                self.addr = self.addr.wrapping_add(1);
                value
            }
            _ => 0xFF,
        };
        Ok(value)
    }

    fn wait_busy(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn delay_us(&mut self, _us: u32) {}
}
