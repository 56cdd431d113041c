use clap::ValueEnum;
use simrec_ingest::{ArtifactKind, Compression};

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum CompressionFlag {
    Auto,
    Gzip,
    None,
}

impl CompressionFlag {
    pub(crate) const fn as_domain(self) -> Compression {
        match self {
            CompressionFlag::Auto => Compression::Auto,
            CompressionFlag::Gzip => Compression::Yes,
            CompressionFlag::None => Compression::No,
        }
    }
}

#[derive(Copy, Clone, ValueEnum)]
pub(crate) enum ArtifactFlag {
    Catalog,
    Similarity,
}

impl ArtifactFlag {
    pub(crate) const fn as_domain(self) -> ArtifactKind {
        match self {
            ArtifactFlag::Catalog => ArtifactKind::Catalog,
            ArtifactFlag::Similarity => ArtifactKind::Similarity,
        }
    }
}
