//! A tiny, fully scripted emulator used by the unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{Cpu, GuestThread, StatusCell, Target, ThreadId, ThreadMap, ThreadStatus};
use crate::mem::{Address, MemConfig, MemState};

#[derive(Debug, Default, Clone, PartialEq)]
pub struct MockCpu {
    pub r: [u32; 13],
    pub sp: u32,
    pub lr: u32,
    pub pc: u32,
    pub s: [f32; 8],
    pub fpscr: u32,
    pub cpsr: u32,
    pub at_breakpoint: bool,
}

impl Cpu for MockCpu {
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
        self.at_breakpoint
    }
}

/// A thread that never executes anything.
///
/// * a single step advances the PC by 4 and ends suspended
/// * a continue leaves the thread running, unless `breakpoint_after` is set,
///   in which case it stops on a breakpoint after that delay
pub struct MockThread {
    pub id: ThreadId,
    pub name: String,
    pub status: Arc<StatusCell>,
    pub cpu: Arc<Mutex<MockCpu>>,
    pub breakpoint_after: Option<Duration>,
    pub resumes: Mutex<Vec<bool>>,
}

impl MockThread {
    pub fn new(id: ThreadId, status: ThreadStatus) -> MockThread {
        MockThread {
            id,
            name: format!("thread_{}", id),
            status: Arc::new(StatusCell::new(status)),
            cpu: Arc::new(Mutex::new(MockCpu::default())),
            breakpoint_after: None,
            resumes: Mutex::new(Vec::new()),
        }
    }

    pub fn breakpoint_after(mut self, delay: Duration) -> MockThread {
        self.breakpoint_after = Some(delay);
        self
    }

    pub fn resumes(&self) -> Vec<bool> {
        self.resumes.lock().unwrap().clone()
    }
}

impl GuestThread for MockThread {
    type Cpu = MockCpu;

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
        self.resumes.lock().unwrap().push(step);

        if step {
            let mut cpu = self.cpu.lock().unwrap();
            cpu.pc += 4;
            cpu.at_breakpoint = false;
            drop(cpu);
            self.status.set(ThreadStatus::Suspend);
            return;
        }

        self.status.set(ThreadStatus::Run);
        if let Some(delay) = self.breakpoint_after {
            let status = Arc::clone(&self.status);
            let cpu = Arc::clone(&self.cpu);
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                cpu.lock().unwrap().at_breakpoint = true;
                status.set(ThreadStatus::Suspend);
            });
        }
    }

    fn suspend(&self) {
        self.status.set(ThreadStatus::Suspend);
    }

    fn with_cpu<R>(&self, f: impl FnOnce(&mut MockCpu) -> R) -> R {
        f(&mut self.cpu.lock().unwrap())
    }
}

pub struct MockTarget {
    pub mem: MemState,
    pub threads: Mutex<ThreadMap<MockThread>>,
    pub breakpoints: Mutex<BTreeMap<Address, bool>>,
}

impl MockTarget {
    pub fn new() -> MockTarget {
        MockTarget {
            mem: MemState::new(MemConfig {
                size: 0x10_0000,
                ..Default::default()
            }),
            threads: Mutex::new(BTreeMap::new()),
            breakpoints: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn with_thread(self, thread: MockThread) -> MockTarget {
        self.threads
            .lock()
            .unwrap()
            .insert(thread.id, Arc::new(thread));
        self
    }

    pub fn thread(&self, id: ThreadId) -> Arc<MockThread> {
        Arc::clone(&self.threads.lock().unwrap()[&id])
    }
}

impl Target for MockTarget {
    type Thread = MockThread;

    fn mem(&self) -> &MemState {
        &self.mem
    }

    fn threads(&self) -> MutexGuard<'_, ThreadMap<MockThread>> {
        self.threads.lock().unwrap()
    }

    fn add_breakpoint(&self, addr: Address, thumb: bool) {
        self.breakpoints.lock().unwrap().insert(addr, thumb);
    }

    fn remove_breakpoint(&self, addr: Address) {
        self.breakpoints.lock().unwrap().remove(&addr);
    }
}
