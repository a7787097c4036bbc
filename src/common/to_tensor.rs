use burn::prelude::*;

pub trait ToTensorF<const D: usize>: Clone {
    fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, D>;
}

impl ToTensorF<1> for f32 {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1> {
        Tensor::from_floats([self], device)
    }
}

impl ToTensorF<1> for Vec<f32> {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1> {
        let n = self.len();

        Tensor::from_data(TensorData::new(self, [n]).convert::<B::FloatElem>(), device)
    }
}

impl ToTensorF<2> for Vec<Vec<f32>> {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 2> {
        let n0 = self.len();
        let n1 = self.first().map(|r| r.len()).unwrap_or(0);
        let data: Vec<f32> = self.concat();

        Tensor::from_data(
            TensorData::new(data, [n0, n1]).convert::<B::FloatElem>(),
            device,
        )
    }
}

pub trait ToTensorI<const D: usize>: Clone {
    fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, D, Int>;
}

impl ToTensorI<1> for usize {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1, Int> {
        Tensor::from_ints([self as i32], device)
    }
}

impl ToTensorI<1> for Vec<usize> {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1, Int> {
        let n = self.len();
        let data: Vec<i64> = self.into_iter().map(|x| x as i64).collect();

        Tensor::from_data(TensorData::new(data, [n]).convert::<B::IntElem>(), device)
    }
}

pub trait ToTensorB<const D: usize>: Clone {
    fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, D, Bool>;
}

impl ToTensorB<1> for bool {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1, Bool> {
        vec![self].to_tensor(device)
    }
}

impl ToTensorB<1> for Vec<bool> {
    fn to_tensor<B: Backend>(self, device: &<B as Backend>::Device) -> Tensor<B, 1, Bool> {
        let n = self.len();

        Tensor::from_data(TensorData::new(self, [n]), device)
    }
}

/// Flattens a tensor into a host side `Vec<f32>`
pub fn to_vec_f32<B: Backend, const D: usize>(t: Tensor<B, D>) -> Vec<f32> {
    t.into_data().iter::<f32>().collect()
}

#[cfg(test)]
mod test {
    use burn::{
        backend::NdArray,
        tensor::{Bool, Int, Tensor},
    };

    use crate::common::to_tensor::{to_vec_f32, ToTensorB, ToTensorI};

    use super::ToTensorF;

    #[test]
    fn test_to_tensor_f32() {
        let d: f32 = 1.1;
        let t: Tensor<NdArray, 1> = d.to_tensor(&Default::default());

        assert_eq!(t.shape().dims.len(), 1);
        assert_eq!(t.shape().dims, [1]);
        assert_eq!(t.into_scalar(), d);
    }

    #[test]
    fn test_to_tensor_vec_f32() {
        let d: Vec<f32> = vec![1.1, 2.2];
        let t: Tensor<NdArray, 1> = d.clone().to_tensor(&Default::default());

        assert_eq!(t.shape().dims, [2]);
        assert_eq!(to_vec_f32(t), d);
    }

    #[test]
    fn test_to_tensor_vec_vec_f32() {
        let d: Vec<Vec<f32>> = vec![vec![1.1, 2.2], vec![3.3, 4.4], vec![1.0, 0.0]];
        let t: Tensor<NdArray, 2> = d.to_tensor(&Default::default());

        assert_eq!(t.shape().dims, [3, 2]);
    }

    #[test]
    fn test_to_tensor_usize() {
        let d: usize = 1;
        let t: Tensor<NdArray, 1, Int> = d.to_tensor(&Default::default());

        assert_eq!(t.shape().dims, [1]);
        assert_eq!(t.into_scalar() as usize, d);
    }

    #[test]
    fn test_to_tensor_vec_usize() {
        let d: Vec<usize> = vec![1, 2];
        let t: Tensor<NdArray, 1, Int> = d.to_tensor(&Default::default());

        assert_eq!(t.shape().dims, [2]);
    }

    #[test]
    fn test_to_tensor_bool() {
        let d: bool = true;
        let t: Tensor<NdArray, 1, Bool> = d.to_tensor(&Default::default());

        assert_eq!(t.shape().dims, [1]);
        assert_eq!(t.into_scalar(), d);
    }

    #[test]
    fn test_to_tensor_vec_bool() {
        let d: Vec<bool> = vec![false, true];
        let t: Tensor<NdArray, 1, Bool> = d.to_tensor(&Default::default());

        assert_eq!(t.shape().dims, [2]);
    }
}
