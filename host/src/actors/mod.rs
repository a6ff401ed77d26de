pub mod desktop;
pub mod sftp;
pub mod terminal;

pub use desktop::DesktopActor;
pub use sftp::SftpSessionActor;
pub use terminal::TerminalSessionActor;
