//! Content-header properties.
//!
//! A properties list starts with one or more 16-bit flag words; bit 0 of each
//! word announces another word. The remaining bits mark which property fields
//! follow, highest bit first. Only the basic class defines properties; the
//! other known classes carry a bare flag word.

use bytes::Bytes;

use super::{CLASS_BASIC, CLASS_CHANNEL, CLASS_CONNECTION, CLASS_EXCHANGE, CLASS_QUEUE, CLASS_TX};
use crate::{
    codec::{ArgField, ArgReader, ArgWriter, ShortString, Table, WireWriter},
    error::{AmqpError, MalformedData},
};

const FLAG_CONTINUATION: u16 = 0x0001;

macro_rules! basic_properties {
    ($( $(#[$meta:meta])* $field:ident : $ty:ty = $flag:literal, )*) => {
        /// Properties of the basic class. `None` fields are omitted on the
        /// wire.
        #[derive(Clone, Debug, Default, PartialEq)]
        pub struct BasicProperties {
            $( $(#[$meta])* pub $field: Option<$ty>, )*
        }

        impl BasicProperties {
            /// Flag word announcing the present fields.
            #[must_use]
            pub const fn flags(&self) -> u16 {
                let mut flags = 0;
                $( if self.$field.is_some() { flags |= $flag; } )*
                flags
            }

            fn read_fields(flags: u16, reader: &mut ArgReader<'_>) -> Result<Self, MalformedData> {
                let mut properties = Self::default();
                $(
                    if flags & $flag != 0 {
                        properties.$field = Some(<$ty as ArgField>::read_arg(reader)?);
                    }
                )*
                Ok(properties)
            }

            fn write_fields(&self, writer: &mut ArgWriter<'_, '_>) -> Result<(), MalformedData> {
                $(
                    if let Some(value) = &self.$field {
                        value.write_arg(writer)?;
                    }
                )*
                Ok(())
            }
        }
    };
}

basic_properties! {
    /// MIME content type.
    content_type: ShortString = 0x8000,
    /// MIME content encoding.
    content_encoding: ShortString = 0x4000,
    /// Application headers.
    headers: Table = 0x2000,
    /// 1 for transient, 2 for persistent.
    delivery_mode: u8 = 0x1000,
    priority: u8 = 0x0800,
    correlation_id: ShortString = 0x0400,
    reply_to: ShortString = 0x0200,
    expiration: ShortString = 0x0100,
    message_id: ShortString = 0x0080,
    timestamp: u64 = 0x0040,
    /// Message type name; `type` on the wire.
    kind: ShortString = 0x0020,
    user_id: ShortString = 0x0010,
    app_id: ShortString = 0x0008,
    cluster_id: ShortString = 0x0004,
}

/// Properties carried by a content header.
#[derive(Clone, Debug, PartialEq)]
pub enum Properties {
    /// Properties of the basic class.
    Basic(BasicProperties),
    /// A class without property fields.
    Empty,
}

impl Default for Properties {
    fn default() -> Self { Self::Basic(BasicProperties::default()) }
}

impl Properties {
    /// Decode the properties of `class_id` from `payload[offset..]`.
    ///
    /// # Errors
    ///
    /// Returns [`AmqpError::BadAmqpData`] if the flag words or fields are
    /// truncated and [`AmqpError::UnknownClass`] for classes outside the
    /// catalogue.
    pub fn decode(class_id: u16, payload: &Bytes, offset: usize) -> Result<Self, AmqpError> {
        let mut reader = ArgReader::new(payload, offset);
        let flags = reader.wire().read_u16()?;
        let mut word = flags;
        while word & FLAG_CONTINUATION != 0 {
            word = reader.wire().read_u16()?;
        }
        match class_id {
            CLASS_BASIC => Ok(Self::Basic(BasicProperties::read_fields(
                flags,
                &mut reader,
            )?)),
            CLASS_CONNECTION | CLASS_CHANNEL | CLASS_EXCHANGE | CLASS_QUEUE | CLASS_TX => {
                Ok(Self::Empty)
            }
            other => Err(AmqpError::UnknownClass(other)),
        }
    }

    /// Encode the flag word and present fields.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedData`] if the properties do not fit.
    pub fn encode(&self, wire: &mut WireWriter<'_>) -> Result<(), MalformedData> {
        match self {
            Self::Basic(properties) => {
                wire.write_u16(properties.flags())?;
                let mut writer = ArgWriter::new(wire);
                properties.write_fields(&mut writer)?;
                writer.finish()
            }
            Self::Empty => wire.write_u16(0),
        }
    }
}

impl From<BasicProperties> for Properties {
    fn from(properties: BasicProperties) -> Self { Self::Basic(properties) }
}
