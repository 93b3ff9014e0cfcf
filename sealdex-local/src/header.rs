//! Binary header prepended to every ciphertext.
//!
//! ```text
//! [version:1][cast:1][kek_id_len:1][kek_id:N][wrapped_dek_len:2][wrapped_dek:M][flags:1][nonce_len:1][nonce:L]
//! ```
//!
//! The cast tag records the plaintext type the value was encrypted as, the
//! flags record the AEAD cipher.

use sealdex::schema::DataType;

use crate::error::Error;

/// Protocol version for the encryption format.
pub const PROTOCOL_VERSION: u8 = 1;

/// Header flags for encryption options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderFlags(u8);

impl HeaderFlags {
    const AES_GCM: u8 = 0x01;

    /// Creates empty flags (ChaCha20-Poly1305).
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Checks if the payload was sealed with AES-256-GCM.
    #[must_use]
    pub const fn is_aes_gcm(self) -> bool {
        (self.0 & Self::AES_GCM) != 0
    }

    /// Marks the payload as sealed with AES-256-GCM.
    #[must_use]
    pub const fn with_aes_gcm(mut self) -> Self {
        self.0 |= Self::AES_GCM;
        self
    }

    /// Returns the raw flags value.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

/// Encodes a plaintext type as a single byte.
#[must_use]
pub const fn cast_tag(data_type: DataType) -> u8 {
    match data_type {
        DataType::String => 0,
        DataType::Integer => 1,
        DataType::Number => 2,
        DataType::Boolean => 3,
        DataType::Timestamp => 4,
        DataType::Json => 5,
    }
}

fn cast_from_tag(tag: u8) -> Result<DataType, Error> {
    Ok(match tag {
        0 => DataType::String,
        1 => DataType::Integer,
        2 => DataType::Number,
        3 => DataType::Boolean,
        4 => DataType::Timestamp,
        5 => DataType::Json,
        other => return Err(Error::InvalidHeader(format!("unknown cast tag: {other}"))),
    })
}

/// Metadata needed to decrypt a ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionHeader {
    cast_as: DataType,
    kek_id: String,
    wrapped_dek: Vec<u8>,
    flags: HeaderFlags,
    nonce: Vec<u8>,
}

impl EncryptionHeader {
    /// Creates a header for the current protocol version.
    #[must_use]
    pub fn new(
        cast_as: DataType,
        kek_id: impl Into<String>,
        wrapped_dek: Vec<u8>,
        flags: HeaderFlags,
        nonce: Vec<u8>,
    ) -> Self {
        Self { cast_as, kek_id: kek_id.into(), wrapped_dek, flags, nonce }
    }

    /// Returns the plaintext type.
    #[must_use]
    pub const fn cast_as(&self) -> DataType {
        self.cast_as
    }

    /// Returns the KEK identifier.
    #[must_use]
    pub fn kek_id(&self) -> &str {
        &self.kek_id
    }

    /// Returns the wrapped DEK.
    #[must_use]
    pub fn wrapped_dek(&self) -> &[u8] {
        &self.wrapped_dek
    }

    /// Returns the header flags.
    #[must_use]
    pub const fn flags(&self) -> HeaderFlags {
        self.flags
    }

    /// Returns the nonce.
    #[must_use]
    pub fn nonce(&self) -> &[u8] {
        &self.nonce
    }

    /// Serializes the header to bytes.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidHeader` if the KEK id or nonce exceeds 255 bytes
    /// or the wrapped DEK exceeds 65535 bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let kek_id_len = u8::try_from(self.kek_id.len()).map_err(|_| {
            Error::InvalidHeader(format!("KEK ID too long: {} bytes (max: 255)", self.kek_id.len()))
        })?;
        let wrapped_dek_len = u16::try_from(self.wrapped_dek.len()).map_err(|_| {
            Error::InvalidHeader(format!(
                "Wrapped DEK too long: {} bytes (max: 65535)",
                self.wrapped_dek.len()
            ))
        })?;
        let nonce_len = u8::try_from(self.nonce.len()).map_err(|_| {
            Error::InvalidHeader(format!("Nonce too long: {} bytes (max: 255)", self.nonce.len()))
        })?;

        let mut bytes = Vec::with_capacity(
            7 + self.kek_id.len() + self.wrapped_dek.len() + self.nonce.len(),
        );
        bytes.push(PROTOCOL_VERSION);
        bytes.push(cast_tag(self.cast_as));
        bytes.push(kek_id_len);
        bytes.extend_from_slice(self.kek_id.as_bytes());
        bytes.extend_from_slice(&wrapped_dek_len.to_be_bytes());
        bytes.extend_from_slice(&self.wrapped_dek);
        bytes.push(self.flags.as_u8());
        bytes.push(nonce_len);
        bytes.extend_from_slice(&self.nonce);

        Ok(bytes)
    }

    /// Parses a header, returning it with the number of bytes consumed.
    ///
    /// # Errors
    ///
    /// Returns `Error::UnsupportedVersion` for an unknown version and
    /// `Error::InvalidHeader` for truncated or malformed data.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), Error> {
        let mut reader = Reader { data, pos: 0 };

        let version = reader.byte("version")?;
        if version != PROTOCOL_VERSION {
            return Err(Error::UnsupportedVersion {
                version,
                supported: PROTOCOL_VERSION.to_string(),
            });
        }

        let cast_as = cast_from_tag(reader.byte("cast tag")?)?;

        let kek_id_len = usize::from(reader.byte("KEK ID length")?);
        let kek_id = String::from_utf8(reader.take(kek_id_len, "KEK ID")?.to_vec())
            .map_err(|e| Error::InvalidHeader(format!("Invalid KEK ID UTF-8: {e}")))?;

        let len_bytes = reader.take(2, "wrapped DEK length")?;
        let wrapped_dek_len = usize::from(u16::from_be_bytes([len_bytes[0], len_bytes[1]]));
        let wrapped_dek = reader.take(wrapped_dek_len, "wrapped DEK")?.to_vec();

        let flags = HeaderFlags(reader.byte("flags")?);

        let nonce_len = usize::from(reader.byte("nonce length")?);
        let nonce = reader.take(nonce_len, "nonce")?.to_vec();

        Ok((Self { cast_as, kek_id, wrapped_dek, flags, nonce }, reader.pos))
    }
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8], Error> {
        let end = self.pos + len;
        let slice = self
            .data
            .get(self.pos..end)
            .ok_or_else(|| Error::InvalidHeader(format!("{what} truncated")))?;
        self.pos = end;
        Ok(slice)
    }

    fn byte(&mut self, what: &str) -> Result<u8, Error> {
        Ok(self.take(1, what)?[0])
    }
}
