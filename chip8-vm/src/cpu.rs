//! CPU and memory state.
use crate::{
    constants::*,
    display::Framebuffer,
    error::{Chip8Error, Chip8Result},
};

/// Core state for a chip8 interpreter.
#[derive(Clone, PartialEq, Eq)]
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the next instruction in memory.
    pub(crate) pc: Address,
    /// Stack pointer, indicating the next free slot on the stack.
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Pointer register used for temporarily storing an address.
    ///
    /// Stored in 16 bits so increments can overflow past 12 bits. Memory
    /// accesses through it are masked to the lowest 12 bits at the point of use.
    pub(crate) address: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Register waiting for the next keypress, while the machine is suspended.
    pub(crate) key_wait: Option<u8>,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
    /// Screen buffer that is drawn too.
    pub(crate) display: Framebuffer,
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        let mut cpu = Self {
            pc: MEM_START as Address,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            address: 0,
            delay_timer: 0,
            sound_timer: 0,
            key_wait: None,

            ram: Box::new([0; MEM_SIZE]),
            stack: [0; STACK_SIZE],
            display: Framebuffer::new(),
        };
        cpu.load_font();
        cpu
    }
}

impl Chip8Cpu {
    pub fn new() -> Self {
        Default::default()
    }

    /// Return every register and memory buffer to its power-on state,
    /// including the builtin font.
    pub(crate) fn reset(&mut self) {
        self.pc = MEM_START as Address;
        self.sp = 0;
        self.registers.fill(0);
        self.address = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.key_wait = None;

        self.ram.fill(0);
        self.stack.fill(0);
        self.display.clear();

        self.load_font();
    }

    fn load_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    /// Reset the machine, then copy the program into memory at `MEM_START`.
    pub(crate) fn install_program(&mut self, bytecode: &[u8]) -> Chip8Result<()> {
        if bytecode.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::InvalidProgramLoad {
                size: bytecode.len(),
                capacity: MAX_PROGRAM_SIZE,
            });
        }

        // Start with clean memory to avoid leaking previous program.
        self.reset();
        self.ram[MEM_START..MEM_START + bytecode.len()].copy_from_slice(bytecode);

        Ok(())
    }

    // ------------------------------------------------------------------------
    // Memory access

    /// Bounds checked memory read.
    pub fn read(&self, addr: usize) -> Option<u8> {
        self.ram.get(addr).copied()
    }

    /// Bounds checked memory write.
    ///
    /// Returns `None` when the address is outside of memory.
    pub fn write(&mut self, addr: usize, value: u8) -> Option<()> {
        self.ram.get_mut(addr).map(|byte| *byte = value)
    }

    /// Effective address of the byte `offset` bytes past the I register.
    #[inline(always)]
    pub(crate) fn i_addr(&self, offset: usize) -> usize {
        (self.address as usize + offset) & ADDRESS_MASK
    }

    // ------------------------------------------------------------------------
    // Registers

    #[inline(always)]
    pub fn register(&self, index: u8) -> u8 {
        self.registers[index as usize & 0xF]
    }

    /// Write a register, wrapping the value to 8 bits.
    #[inline(always)]
    pub fn set_register(&mut self, index: u8, value: u16) {
        self.registers[index as usize & 0xF] = (value & 0xFF) as u8;
    }

    /// Write the flag register VF.
    #[inline(always)]
    pub(crate) fn set_flag(&mut self, flag: bool) {
        self.registers[FLAG_REGISTER] = flag as u8;
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    /// Value of the I register, unmasked.
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn set_address(&mut self, address: Address) {
        self.address = address;
    }

    pub fn pc(&self) -> Address {
        self.pc
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    /// Return addresses currently on the call stack, oldest first.
    pub fn stack(&self) -> &[Address] {
        &self.stack[..self.sp]
    }

    pub fn ram(&self) -> &[u8; MEM_SIZE] {
        &self.ram
    }

    pub fn display(&self) -> &Framebuffer {
        &self.display
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    /// Register waiting for a keypress, if the machine is suspended.
    pub fn key_wait(&self) -> Option<u8> {
        self.key_wait
    }

    // ------------------------------------------------------------------------
    // Call stack

    /// Push a return address.
    ///
    /// Returns `false` without modifying the stack when it is full.
    pub(crate) fn push_return(&mut self, address: Address) -> bool {
        if self.sp >= STACK_SIZE {
            return false;
        }
        self.stack[self.sp] = address;
        self.sp += 1;
        true
    }

    pub(crate) fn pop_return(&mut self) -> Option<Address> {
        self.sp = self.sp.checked_sub(1)?;
        Some(self.stack[self.sp])
    }

    // ------------------------------------------------------------------------
    // Timers

    /// Count down the delay timer.
    #[inline]
    pub fn tick_delay(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
    }

    #[inline]
    pub fn tick_sound(&mut self) {
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_power_on_state() {
        let cpu = Chip8Cpu::new();
        assert_eq!(cpu.pc(), 0x200);
        assert_eq!(cpu.sp(), 0);
        assert_eq!(&cpu.ram()[0..FONTSET_DATA_LENGTH], &FONTSET[..]);
        assert!(cpu.ram()[MEM_START..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_install_program_resets() {
        let mut cpu = Chip8Cpu::new();
        cpu.set_register(3, 0x42);
        cpu.set_address(0x321);
        cpu.delay_timer = 9;
        cpu.key_wait = Some(1);
        cpu.write(0x100, 0xAA).unwrap();
        cpu.write(0x300, 0xBB).unwrap();
        assert!(cpu.push_return(0x208));

        cpu.install_program(&[0x60, 0x05]).unwrap();

        assert_eq!(cpu.register(3), 0);
        assert_eq!(cpu.address(), 0);
        assert_eq!(cpu.delay_timer(), 0);
        assert_eq!(cpu.key_wait(), None);
        assert_eq!(cpu.sp(), 0);
        assert_eq!(cpu.read(0x100), Some(0));
        assert_eq!(cpu.read(0x300), Some(0));
        assert_eq!(cpu.read(0x200), Some(0x60));
        assert_eq!(cpu.read(0x201), Some(0x05));
        assert_eq!(&cpu.ram()[0..FONTSET_DATA_LENGTH], &FONTSET[..]);
    }

    #[test]
    fn test_install_program_too_large() {
        let mut cpu = Chip8Cpu::new();
        let rom = vec![0xAB; MAX_PROGRAM_SIZE + 1];
        assert!(matches!(
            cpu.install_program(&rom),
            Err(Chip8Error::InvalidProgramLoad { size, capacity })
                if size == MAX_PROGRAM_SIZE + 1 && capacity == MAX_PROGRAM_SIZE
        ));

        // Exactly fills memory
        let rom = vec![0xAB; MAX_PROGRAM_SIZE];
        assert!(cpu.install_program(&rom).is_ok());
        assert_eq!(cpu.read(MEM_SIZE - 1), Some(0xAB));
    }

    #[test]
    fn test_bounds_checked_access() {
        let mut cpu = Chip8Cpu::new();
        assert_eq!(cpu.read(MEM_SIZE), None);
        assert_eq!(cpu.write(MEM_SIZE, 1), None);
        assert_eq!(cpu.write(MEM_SIZE - 1, 1), Some(()));
        assert_eq!(cpu.read(MEM_SIZE - 1), Some(1));
    }

    #[test]
    fn test_register_wrap() {
        let mut cpu = Chip8Cpu::new();
        cpu.set_register(0, 0xFF + 3);
        assert_eq!(cpu.register(0), 2);
        cpu.set_register(0xF, 0x100);
        assert_eq!(cpu.register(0xF), 0);
    }

    #[test]
    fn test_i_addr_masks_to_12_bits() {
        let mut cpu = Chip8Cpu::new();
        cpu.set_address(0xFFE);
        assert_eq!(cpu.i_addr(0), 0xFFE);
        assert_eq!(cpu.i_addr(2), 0x000);
        cpu.set_address(0x1005);
        assert_eq!(cpu.i_addr(0), 0x005);
    }

    #[test]
    fn test_call_stack_capacity() {
        let mut cpu = Chip8Cpu::new();
        for i in 0..STACK_SIZE {
            assert!(cpu.push_return(0x200 + i as Address * 2));
        }
        assert!(!cpu.push_return(0x400));
        assert_eq!(cpu.sp(), STACK_SIZE);

        for i in (0..STACK_SIZE).rev() {
            assert_eq!(cpu.pop_return(), Some(0x200 + i as Address * 2));
        }
        assert_eq!(cpu.pop_return(), None);
        assert_eq!(cpu.sp(), 0);
    }

    #[test]
    fn test_timers_floor_at_zero() {
        let mut cpu = Chip8Cpu::new();
        cpu.delay_timer = 1;
        cpu.tick_delay();
        cpu.tick_delay();
        assert_eq!(cpu.delay_timer(), 0);
        cpu.tick_sound();
        assert_eq!(cpu.sound_timer(), 0);
    }
}
