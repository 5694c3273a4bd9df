/// Input and output collaborators
pub mod fastq;
pub mod sheet;
