use burn::{
    module::Module,
    tensor::{backend::Backend, Tensor},
};

use crate::common::{agent::Policy, utils::modules::MLP};

/// Maps an observation to one Q value per discrete action
#[derive(Module, Debug)]
pub struct QNetwork<B: Backend> {
    mlp: MLP<B>,
}

impl<B: Backend> QNetwork<B> {
    pub fn new(obs_size: usize, n_actions: usize, net_arch: &[usize], device: &B::Device) -> Self {
        let mut sizes = vec![obs_size];
        sizes.extend_from_slice(net_arch);
        sizes.push(n_actions);

        Self {
            mlp: MLP::new(&sizes, device),
        }
    }

    pub fn forward(&self, obs: Tensor<B, 2>) -> Tensor<B, 2> {
        self.mlp.forward(obs)
    }

    pub fn n_actions(&self) -> usize {
        self.mlp.out_size()
    }
}

impl<B: Backend> Policy<B> for QNetwork<B> {
    fn update(&mut self, from: &Self, tau: Option<f32>) {
        self.mlp.update(&from.mlp, tau)
    }
}

#[cfg(test)]
mod test {
    use burn::{backend::NdArray, tensor::Tensor};

    use super::QNetwork;

    #[test]
    fn one_value_per_action() {
        let q = QNetwork::<NdArray>::new(4, 2, &[64, 64], &Default::default());
        assert_eq!(q.n_actions(), 2);

        let out = q.forward(Tensor::zeros([5, 4], &Default::default()));
        assert_eq!(out.dims(), [5, 2]);
    }
}
