//! A low-level blocking TCP client.
//!
//! This client is blocking and so is primarily used as a testing utility
//! rather than an actual game client. Liveness probes are answered
//! transparently whenever the client reads.

use anyhow::{Error, bail};
use std::{
    net::{SocketAddr, TcpStream},
    thread,
    time::Duration,
};

use super::{
    super::game::{
        UserError,
        entities::{CardCategory, Color, Coordinate, DrawSource, Facing, Username},
    },
    messages::{ClientError, ServerMessage, UserCommand},
    utils,
};

/// Default timeout for reading from the server.
pub const READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for writing to the server.
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

pub struct Client {
    /// Name this connection logged in with, once accepted.
    pub username: Option<Username>,
    pub stream: TcpStream,
    /// Whether pings are answered automatically.
    pub answer_probes: bool,
}

impl Client {
    /// Open a connection, retrying with shrinking timeouts (1s, 500ms, 100ms).
    ///
    /// # Errors
    ///
    /// Returns an error if no attempt succeeds.
    pub fn connect(addr: &SocketAddr) -> Result<Self, Error> {
        let mut connect_timeouts = vec![
            Duration::from_millis(100),
            Duration::from_millis(500),
            Duration::from_secs(1),
        ];
        while let Some(connect_timeout) = connect_timeouts.pop() {
            match TcpStream::connect_timeout(addr, connect_timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(READ_TIMEOUT))?;
                    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
                    return Ok(Self {
                        username: None,
                        stream,
                        answer_probes: true,
                    });
                }
                _ => thread::sleep(connect_timeout),
            }
        }
        bail!("couldn't connect to {addr}")
    }

    /// Connect and log in, waiting for the acknowledgement.
    pub fn connect_as(username: &str, addr: &SocketAddr) -> Result<Self, Error> {
        let mut client = Self::connect(addr)?;
        client.login(username)?;
        Ok(client)
    }

    pub fn send(&mut self, command: UserCommand) -> Result<(), Error> {
        utils::write_prefixed(&mut self.stream, &command)?;
        Ok(())
    }

    /// Log in and wait for the acknowledgement.
    pub fn login(&mut self, username: &str) -> Result<(), Error> {
        let username = Username::new(username);
        self.send(UserCommand::Login(username.clone()))?;
        self.recv_ack()?;
        self.username = Some(username);
        Ok(())
    }

    pub fn fix_capacity(&mut self, capacity: usize) -> Result<(), Error> {
        self.send(UserCommand::FixCapacity(capacity))
    }

    pub fn assign_color(&mut self, color: Color) -> Result<(), Error> {
        self.send(UserCommand::AssignColor(color))
    }

    pub fn place_card(
        &mut self,
        hand_index: usize,
        coordinate: Coordinate,
        facing: Facing,
    ) -> Result<(), Error> {
        self.send(UserCommand::PlaceCard {
            hand_index,
            coordinate,
            facing,
        })
    }

    pub fn draw_card(&mut self, category: CardCategory, source: DrawSource) -> Result<(), Error> {
        self.send(UserCommand::DrawCard { category, source })
    }

    pub fn choose_objective(&mut self, index: usize) -> Result<(), Error> {
        self.send(UserCommand::ChooseObjective(index))
    }

    pub fn send_chat(&mut self, text: &str) -> Result<(), Error> {
        self.send(UserCommand::SendChat(text.to_string()))
    }

    /// Read the next message that isn't a probe. Errors are returned as
    /// messages rather than failures.
    pub fn read(&mut self) -> Result<ServerMessage, Error> {
        loop {
            match utils::read_prefixed::<ServerMessage, TcpStream>(&mut self.stream) {
                Ok(ServerMessage::Ping) if self.answer_probes => {
                    utils::write_prefixed(&mut self.stream, &UserCommand::Pong)?;
                }
                Ok(ServerMessage::Ping) => {}
                Ok(msg) => return Ok(msg),
                Err(error) => bail!(error),
            }
        }
    }

    pub fn recv(&mut self) -> Result<ServerMessage, Error> {
        match self.read()? {
            ServerMessage::ClientError(error) => bail!(error),
            ServerMessage::UserError(error) => bail!(error),
            msg => Ok(msg),
        }
    }

    /// Read until `pred` matches, discarding everything before it.
    pub fn recv_until<F>(&mut self, mut pred: F) -> Result<ServerMessage, Error>
    where
        F: FnMut(&ServerMessage) -> bool,
    {
        loop {
            let msg = self.read()?;
            if pred(&msg) {
                return Ok(msg);
            }
        }
    }

    pub fn recv_ack(&mut self) -> Result<UserCommand, Error> {
        match self.read()? {
            ServerMessage::Ack(command) => Ok(command),
            ServerMessage::ClientError(error) => bail!(error),
            ServerMessage::UserError(error) => bail!(error),
            response => bail!("invalid server response: {response}"),
        }
    }

    pub fn recv_client_error(&mut self) -> Result<ClientError, Error> {
        match self.read()? {
            ServerMessage::ClientError(error) => Ok(error),
            response => bail!("invalid server response: {response}"),
        }
    }

    pub fn recv_user_error(&mut self) -> Result<UserError, Error> {
        match self.read()? {
            ServerMessage::UserError(error) => Ok(error),
            response => bail!("invalid server response: {response}"),
        }
    }
}
