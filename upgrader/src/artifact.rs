//! Creation code of the implementation contract.
use std::{fs, io, path::Path};

use alloy::primitives::{hex, Bytes};
use serde::Deserialize;

/// Errors raised while loading an [`Artifact`].
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    /// The artifact file could not be read.
    #[error("failed to read artifact")]
    Read(#[from] io::Error),
    /// The artifact looks like JSON but is not a compiler artifact.
    #[error("artifact is not valid JSON")]
    Json(#[from] serde_json::Error),
    /// The bytecode is not hex, e.g. because libraries are left unlinked.
    #[error("bytecode is not valid hex")]
    Hex(#[from] hex::FromHexError),
    /// The artifact has no bytecode, e.g. for an interface or abstract
    /// contract.
    #[error("artifact has no bytecode")]
    Empty,
}

/// Bytecode section of a compiler artifact.
#[derive(Deserialize)]
#[serde(untagged)]
enum Bytecode {
    /// `forge build`: `{"bytecode": {"object": "0x.."}}`.
    Forge { object: String },
    /// Hardhat: `{"bytecode": "0x.."}`.
    Hardhat(String),
}

#[derive(Deserialize)]
struct CompilerOutput {
    bytecode: Bytecode,
}

/// Contract creation code plus ABI-encoded constructor arguments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    bytecode: Bytes,
    constructor_args: Bytes,
}

impl Artifact {
    /// An artifact deploying `bytecode` without constructor arguments.
    ///
    /// # Errors
    ///
    /// [`ArtifactError::Empty`] if `bytecode` is empty.
    pub fn new(bytecode: impl Into<Bytes>) -> Result<Self, ArtifactError> {
        let bytecode = bytecode.into();
        if bytecode.is_empty() {
            return Err(ArtifactError::Empty);
        }
        Ok(Self { bytecode, constructor_args: Bytes::new() })
    }

    /// Load the artifact at `path`.
    ///
    /// Accepts `forge` and Hardhat JSON artifacts, or a file holding only
    /// the hex-encoded bytecode.
    ///
    /// # Errors
    ///
    /// If the file cannot be read or holds no usable bytecode.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let contents = fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse artifact file contents, see [`Artifact::load`].
    ///
    /// # Errors
    ///
    /// If `contents` holds no usable bytecode.
    pub fn parse(contents: &str) -> Result<Self, ArtifactError> {
        let contents = contents.trim();
        let bytecode = if contents.starts_with('{') {
            let output: CompilerOutput = serde_json::from_str(contents)?;
            match output.bytecode {
                Bytecode::Forge { object } => hex::decode(object.trim())?,
                Bytecode::Hardhat(code) => hex::decode(code.trim())?,
            }
        } else {
            hex::decode(contents)?
        };
        Self::new(bytecode)
    }

    /// Append ABI-encoded constructor arguments.
    #[must_use]
    pub fn with_constructor_args(mut self, args: impl Into<Bytes>) -> Self {
        self.constructor_args = args.into();
        self
    }

    /// Bytecode without constructor arguments.
    #[must_use]
    pub fn bytecode(&self) -> &Bytes {
        &self.bytecode
    }

    /// Data sent in the creation transaction.
    #[must_use]
    pub fn creation_code(&self) -> Bytes {
        [self.bytecode.as_ref(), self.constructor_args.as_ref()]
            .concat()
            .into()
    }

    /// Size of the creation code in bytes.
    #[must_use]
    pub fn code_size(&self) -> usize {
        self.bytecode.len() + self.constructor_args.len()
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::bytes;

    use super::*;

    #[test]
    fn parses_forge_artifact() {
        let artifact = Artifact::parse(
            r#"{"abi": [], "bytecode": {"object": "0x60806040", "linkReferences": {}}}"#,
        )
        .unwrap();
        assert_eq!(artifact.bytecode(), &bytes!("60806040"));
    }

    #[test]
    fn parses_hardhat_artifact() {
        let artifact = Artifact::parse(
            r#"{"contractName": "NoxV2", "bytecode": "0x6080"}"#,
        )
        .unwrap();
        assert_eq!(artifact.bytecode(), &bytes!("6080"));
    }

    #[test]
    fn parses_raw_hex() {
        let artifact = Artifact::parse("0x60806040\n").unwrap();
        assert_eq!(artifact.code_size(), 4);
    }

    #[test]
    fn constructor_args_are_appended() {
        let artifact = Artifact::new(bytes!("6080"))
            .unwrap()
            .with_constructor_args(bytes!("0001"));
        assert_eq!(artifact.creation_code(), bytes!("60800001"));
        assert_eq!(artifact.code_size(), 4);
    }

    #[test]
    fn rejects_unusable_bytecode() {
        assert!(matches!(
            Artifact::parse(r#"{"bytecode": {"object": "0x"}}"#),
            Err(ArtifactError::Empty)
        ));
        assert!(matches!(
            Artifact::parse(
                r#"{"bytecode": {"object": "0x73__$1ba4f5e8b9$__6080"}}"#
            ),
            Err(ArtifactError::Hex(_))
        ));
        assert!(matches!(
            Artifact::parse(r#"{"abi": []}"#),
            Err(ArtifactError::Json(_))
        ));
    }
}
