/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::api::Epoch;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Cursor, Read};

/// The framed body of a `DpEnd` message.
#[derive(Clone, Debug, PartialEq)]
pub struct Payload {
    pub epoch: Epoch,
    pub command_count: usize,
    pub display_list_data: Vec<u8>,
}

impl Payload {
    pub fn to_data(&self) -> io::Result<Vec<u8>> {
        let mut data = Vec::with_capacity(20 + self.display_list_data.len());
        data.write_u32::<LittleEndian>(self.epoch.0)?;
        data.write_u64::<LittleEndian>(self.command_count as u64)?;
        data.write_u64::<LittleEndian>(self.display_list_data.len() as u64)?;
        data.extend_from_slice(&self.display_list_data);
        Ok(data)
    }

    pub fn from_data(data: &[u8]) -> io::Result<Payload> {
        let mut payload_reader = Cursor::new(data);
        let epoch = Epoch(payload_reader.read_u32::<LittleEndian>()?);
        let command_count = payload_reader.read_u64::<LittleEndian>()? as usize;

        let dl_size = payload_reader.read_u64::<LittleEndian>()? as usize;
        let remaining = data.len() - payload_reader.position() as usize;
        if dl_size > remaining {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "display list length exceeds payload",
            ));
        }
        let mut display_list_data = vec![0; dl_size];
        payload_reader.read_exact(&mut display_list_data[..])?;

        Ok(Payload {
            epoch,
            command_count,
            display_list_data,
        })
    }
}

#[cfg(not(feature = "ipc"))]
mod platform {
    use std::io;
    use std::sync::mpsc;

    pub type MsgSender<T> = mpsc::Sender<T>;
    pub type MsgReceiver<T> = mpsc::Receiver<T>;

    pub fn msg_channel<T>() -> Result<(MsgSender<T>, MsgReceiver<T>), io::Error> {
        Ok(mpsc::channel())
    }
}

#[cfg(feature = "ipc")]
mod platform {
    use ipc_channel::ipc;
    use serde::{Deserialize, Serialize};
    use std::io;

    pub type MsgSender<T> = ipc::IpcSender<T>;
    pub type MsgReceiver<T> = ipc::IpcReceiver<T>;

    pub fn msg_channel<T>() -> Result<(MsgSender<T>, MsgReceiver<T>), io::Error>
    where
        T: for<'de> Deserialize<'de> + Serialize,
    {
        ipc::channel()
    }
}

pub use self::platform::{msg_channel, MsgReceiver, MsgSender};
