#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(all(target_arch = "x86", target_os = "none"))]
mod boot {
    extern crate rlibc;

    use core::arch::global_asm;
    use core::panic::PanicInfo;

    use log::{debug, error, info};
    use pmode_kernel::arch::x86::{self, Hardware, HARDWARE};
    use pmode_kernel::arch::Cpu;
    use pmode_kernel::config::KernelConfig;
    use pmode_kernel::drivers::serial::{SerialPort, COM1};
    use pmode_kernel::drivers::vga::VgaWriter;
    use pmode_kernel::drivers::{Console, TextSink};
    use pmode_kernel::kernel::{bring_up, KernelState};
    use pmode_kernel::logger::KernelLogger;

    const MULTIBOOT_BOOTLOADER_MAGIC: u32 = 0x2BAD_B002;
    const KERNEL_STACK_SIZE: usize = 128 * 1024;

    static KERNEL: KernelState<Hardware> = KernelState::new();
    static LOGGER: KernelLogger<Console<'static, Hardware>> = KernelLogger::new();

    // Multiboot v1 header (page-aligned modules, memory map), boot stack and
    // the entry point the loader jumps to: EAX = magic, EBX = info pointer.
    global_asm!(
        ".section .multiboot, \"a\"",
        ".p2align 2",
        ".long 0x1BADB002",
        ".long 0x00000003",
        ".long -(0x1BADB002 + 0x00000003)",
        "",
        ".section .bss",
        ".p2align 4",
        "kernel_stack_bottom:",
        ".skip {stack_size}",
        "kernel_stack_top:",
        "",
        ".section .text",
        ".global _start",
        "_start:",
        "    movl $kernel_stack_top, %esp",
        "    pushl %eax",
        "    pushl %ebx",
        "    call {kmain}",
        "1:  cli",
        "    hlt",
        "    jmp 1b",
        stack_size = const KERNEL_STACK_SIZE,
        kmain = sym kmain,
        options(att_syntax)
    );

    extern "C" fn kmain(multiboot_info: u32, magic: u32) -> ! {
        let config = KernelConfig::DEFAULT;

        let mut serial = SerialPort::new(&HARDWARE, COM1);
        unsafe { serial.init() };
        let vga = unsafe { VgaWriter::hardware() };
        let mut console = Console::new(Some(vga), Some(serial));

        console.clear_screen();
        console.write_string(concat!("pmode-kernel ", env!("CARGO_PKG_VERSION"), "\n").as_bytes());

        if LOGGER.init(console, config.log_level).is_err() {
            halt_forever();
        }

        if magic != MULTIBOOT_BOOTLOADER_MAGIC {
            error!("not started by a multiboot loader (magic {:#010x})", magic);
            halt_forever();
        }
        debug!("multiboot info at {:#010x}", multiboot_info);

        if let Err(e) = bring_up(&KERNEL, &HARDWARE, &config) {
            error!("bring-up failed: {}", e);
            halt_forever();
        }
        info!("boot status:\n{}", KERNEL.status());

        loop {
            if let Some(keyboard) = KERNEL.keyboard() {
                while let Some(scancode) = keyboard.next_scancode() {
                    debug!("scancode {:#04x}", scancode);
                }
            }
            x86::halt();
        }
    }

    fn halt_forever() -> ! {
        HARDWARE.disable_interrupts();
        loop {
            x86::halt();
        }
    }

    #[panic_handler]
    fn panic(info: &PanicInfo) -> ! {
        error!("PANIC: {}", info);
        halt_forever()
    }
}

#[cfg(not(target_os = "none"))]
fn main() {
    eprintln!("pmode-kernel runs under a multiboot loader; build it for the i686-pmode target");
}
