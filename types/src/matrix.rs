//! Protobuf messages and their conversion to [`strassen::Matrix`].

use strassen::Matrix;

use crate::FrameError;

/// A square matrix on the wire: side length plus row-major values.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MatrixProto {
    #[prost(uint32, tag = "1")]
    pub size: u32,
    #[prost(sint32, repeated, tag = "2")]
    pub values: Vec<i32>,
}

/// The ordered chain a client wants multiplied.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MultiplyRequest {
    #[prost(message, repeated, tag = "1")]
    pub matrices: Vec<MatrixProto>,
}

/// The chain product.
#[derive(Clone, PartialEq, prost::Message)]
pub struct MultiplyResponse {
    #[prost(message, optional, tag = "1")]
    pub result: Option<MatrixProto>,
}

impl From<&Matrix> for MatrixProto {
    fn from(m: &Matrix) -> Self {
        Self {
            size: m.size() as u32,
            values: m.as_slice().to_vec(),
        }
    }
}

impl From<Matrix> for MatrixProto {
    fn from(m: Matrix) -> Self {
        let size = m.size() as u32;
        Self {
            size,
            values: m.into_vec(),
        }
    }
}

impl TryFrom<MatrixProto> for Matrix {
    type Error = FrameError;

    fn try_from(proto: MatrixProto) -> Result<Self, Self::Error> {
        Ok(Matrix::from_vec(proto.size as usize, proto.values)?)
    }
}

impl MultiplyRequest {
    pub fn from_matrices<'a>(matrices: impl IntoIterator<Item = &'a Matrix>) -> Self {
        Self {
            matrices: matrices.into_iter().map(MatrixProto::from).collect(),
        }
    }

    /// Converts every matrix, failing on the first malformed one.
    pub fn into_matrices(self) -> Result<Vec<Matrix>, FrameError> {
        self.matrices.into_iter().map(Matrix::try_from).collect()
    }
}

impl MultiplyResponse {
    pub fn from_matrix(m: Matrix) -> Self {
        Self {
            result: Some(m.into()),
        }
    }
}
