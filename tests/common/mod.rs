#![allow(dead_code)]

//! A toy emulator whose guest threads run on real OS threads.
//!
//! Every "instruction" increments `r0` and advances the PC by 4. A running
//! thread stops as soon as its PC lands on a registered breakpoint.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;

use emu_gdbstub::mem::{Address, MemConfig, MemState};
use emu_gdbstub::target::{
    Cpu, GuestThread, StatusCell, Target, ThreadId, ThreadMap, ThreadStatus,
};

type Breakpoints = Arc<Mutex<BTreeMap<Address, bool>>>;

pub struct EmuCpu {
    pub r: [u32; 13],
    pub sp: u32,
    pub lr: u32,
    pub pc: u32,
    pub s: [f32; 8],
    pub fpscr: u32,
    pub cpsr: u32,
    breakpoints: Breakpoints,
}

impl EmuCpu {
    fn step(&mut self) {
        self.r[0] = self.r[0].wrapping_add(1);
        self.pc = self.pc.wrapping_add(4);
    }
}

impl Cpu for EmuCpu {
    fn read_reg(&self, n: usize) -> u32 {
        self.r[n]
    }
    fn write_reg(&mut self, n: usize, value: u32) {
        self.r[n] = value
    }
    fn read_sp(&self) -> u32 {
        self.sp
    }
    fn write_sp(&mut self, value: u32) {
        self.sp = value
    }
    fn read_lr(&self) -> u32 {
        self.lr
    }
    fn write_lr(&mut self, value: u32) {
        self.lr = value
    }
    fn read_pc(&self) -> u32 {
        self.pc
    }
    fn write_pc(&mut self, value: u32) {
        self.pc = value
    }
    fn read_float_reg(&self, n: usize) -> f32 {
        self.s[n]
    }
    fn write_float_reg(&mut self, n: usize, value: f32) {
        self.s[n] = value
    }
    fn read_fpscr(&self) -> u32 {
        self.fpscr
    }
    fn write_fpscr(&mut self, value: u32) {
        self.fpscr = value
    }
    fn read_cpsr(&self) -> u32 {
        self.cpsr
    }
    fn write_cpsr(&mut self, value: u32) {
        self.cpsr = value
    }
    fn hit_breakpoint(&self) -> bool {
        self.breakpoints.lock().unwrap().contains_key(&self.pc)
    }
}

pub struct EmuThread {
    id: ThreadId,
    name: String,
    status: StatusCell,
    cpu: Mutex<EmuCpu>,
    single_step: AtomicBool,
    stop_requested: AtomicBool,
    exit: AtomicBool,
}

impl EmuThread {
    /// Scheduler loop, run on a dedicated OS thread.
    fn run(&self) {
        while !self.exit.load(Ordering::SeqCst) {
            if !self
                .status
                .wait_until(|s| s == ThreadStatus::Run, Duration::from_millis(5))
            {
                continue;
            }

            let at_breakpoint = {
                let mut cpu = self.cpu.lock().unwrap();
                cpu.step();
                cpu.hit_breakpoint()
            };

            let step = self.single_step.swap(false, Ordering::SeqCst);
            let stop = self.stop_requested.swap(false, Ordering::SeqCst);
            if at_breakpoint || step || stop {
                self.status.set(ThreadStatus::Suspend);
            } else {
                std::thread::sleep(Duration::from_micros(100));
            }
        }
    }

    pub fn pc(&self) -> u32 {
        self.cpu.lock().unwrap().pc
    }
}

impl GuestThread for EmuThread {
    type Cpu = EmuCpu;

    fn id(&self) -> ThreadId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn status(&self) -> &StatusCell {
        &self.status
    }

    fn resume(&self, step: bool) {
        self.stop_requested.store(false, Ordering::SeqCst);
        self.single_step.store(step, Ordering::SeqCst);
        self.status.set(ThreadStatus::Run);
    }

    fn suspend(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    fn with_cpu<R>(&self, f: impl FnOnce(&mut EmuCpu) -> R) -> R {
        f(&mut self.cpu.lock().unwrap())
    }

    fn stack_traceback(&self) -> String {
        format!("  #0 {:#010x} in {}", self.pc(), self.name)
    }
}

pub struct Emulator {
    mem: MemState,
    threads: Mutex<ThreadMap<EmuThread>>,
    breakpoints: Breakpoints,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Emulator {
    pub fn new() -> Emulator {
        Emulator {
            mem: MemState::new(MemConfig::default()),
            threads: Mutex::new(BTreeMap::new()),
            breakpoints: Arc::new(Mutex::new(BTreeMap::new())),
            workers: Mutex::new(Vec::new()),
        }
    }

    /// Start a suspended thread at `entry`.
    pub fn spawn_thread(&self, id: ThreadId, name: &str, entry: u32) -> Arc<EmuThread> {
        let thread = Arc::new(EmuThread {
            id,
            name: name.to_owned(),
            status: StatusCell::new(ThreadStatus::Suspend),
            cpu: Mutex::new(EmuCpu {
                r: [0; 13],
                sp: 0,
                lr: 0,
                pc: entry,
                s: [0.0; 8],
                fpscr: 0,
                cpsr: 0x10,
                breakpoints: Arc::clone(&self.breakpoints),
            }),
            single_step: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            exit: AtomicBool::new(false),
        });

        let worker = {
            let thread = Arc::clone(&thread);
            std::thread::spawn(move || thread.run())
        };
        self.workers.lock().unwrap().push(worker);
        self.threads.lock().unwrap().insert(id, Arc::clone(&thread));
        thread
    }

    pub fn breakpoints(&self) -> BTreeMap<Address, bool> {
        self.breakpoints.lock().unwrap().clone()
    }
}

impl Target for Emulator {
    type Thread = EmuThread;

    fn mem(&self) -> &MemState {
        &self.mem
    }

    fn threads(&self) -> MutexGuard<'_, ThreadMap<EmuThread>> {
        self.threads.lock().unwrap()
    }

    fn add_breakpoint(&self, addr: Address, thumb: bool) {
        self.breakpoints.lock().unwrap().insert(addr, thumb);
    }

    fn remove_breakpoint(&self, addr: Address) {
        self.breakpoints.lock().unwrap().remove(&addr);
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        for thread in self.threads.lock().unwrap().values() {
            thread.exit.store(true, Ordering::SeqCst);
        }
        for worker in self.workers.lock().unwrap().drain(..) {
            let _ = worker.join();
        }
    }
}

pub fn checksum(body: &[u8]) -> u8 {
    body.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// A minimal GDB client.
pub struct Client {
    stream: TcpStream,
}

impl Client {
    pub fn connect(addr: SocketAddr) -> Client {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(10)))
            .unwrap();
        Client { stream }
    }

    pub fn send_raw(&mut self, data: &[u8]) {
        self.stream.write_all(data).unwrap();
    }

    pub fn send(&mut self, body: &str) {
        let frame = format!("${}#{:02x}", body, checksum(body.as_bytes()));
        self.send_raw(frame.as_bytes());
    }

    pub fn read_byte(&mut self) -> u8 {
        let mut byte = [0];
        self.stream.read_exact(&mut byte).unwrap();
        byte[0]
    }

    /// Read a `$...#xx` reply, checking its checksum.
    pub fn read_reply(&mut self) -> String {
        assert_eq!(self.read_byte(), b'$');
        let mut body = Vec::new();
        loop {
            match self.read_byte() {
                b'#' => break,
                b => body.push(b),
            }
        }
        let digits = [self.read_byte(), self.read_byte()];
        let expected =
            u8::from_str_radix(std::str::from_utf8(&digits).unwrap(), 16).unwrap();
        assert_eq!(expected, checksum(&body));
        String::from_utf8(body).unwrap()
    }

    /// Send a command, and return the body of its (acked) reply.
    pub fn request(&mut self, body: &str) -> String {
        self.send(body);
        assert_eq!(self.read_byte(), b'+', "no ack for {:?}", body);
        self.read_reply()
    }

    /// Whether the server closed the connection.
    pub fn at_eof(&mut self) -> bool {
        let mut buf = [0];
        matches!(self.stream.read(&mut buf), Ok(0))
    }
}
