use burn::{
    module::Param,
    nn::Linear,
    tensor::{backend::Backend, Tensor},
};

// From https://github.com/benbaarber/rl/blob/main/examples/dqn_snake/model.rs#L89, thanks benbaarber :)
fn soft_update_tensor<B: Backend, const D: usize>(
    from: &Param<Tensor<B, D>>,
    to: Param<Tensor<B, D>>,
    tau: f32,
) -> Param<Tensor<B, D>> {
    to.map(|tensor| (tensor * (1.0 - tau) + from.val() * tau).detach())
}

/// Polyak update of `to` towards `from`:
///
/// to = tau * from + (1 - tau) * to
///
/// `tau = None` is a hard copy. Parameter ids of `to` are kept, so
/// optimiser state keyed on them stays valid.
pub fn update_linear<B: Backend>(from: &Linear<B>, to: Linear<B>, tau: Option<f32>) -> Linear<B> {
    assert_eq!(from.weight.shape(), to.weight.shape());

    let tau = tau.unwrap_or(1.0);
    let mut to = to;

    to.weight = soft_update_tensor(&from.weight, to.weight, tau);
    to.bias = match (from.bias.as_ref(), to.bias) {
        (Some(from_bias), Some(to_bias)) => Some(soft_update_tensor(from_bias, to_bias, tau)),
        (None, None) => None,
        _ => panic!("cannot update a linear layer from one with a different bias layout"),
    };

    to
}

#[cfg(test)]
mod test {
    use burn::{
        backend::NdArray,
        module::{Module, Param},
        nn::{Linear, LinearConfig},
        tensor::{backend::Backend, Float, Tensor},
    };

    use crate::common::{agent::Policy, utils::module_update::soft_update_tensor};

    use super::update_linear;

    #[derive(Module, Debug)]
    struct LinearPolicy<B: Backend> {
        layer: Linear<B>,
    }

    impl<B: Backend> LinearPolicy<B> {
        fn new(in_size: usize, out_size: usize, device: &B::Device) -> Self {
            Self {
                layer: LinearConfig::new(in_size, out_size).init(device),
            }
        }
    }

    impl<B: Backend> Policy<B> for LinearPolicy<B> {
        fn update(&mut self, from: &Self, tau: Option<f32>) {
            self.layer = update_linear(&from.layer, self.layer.clone(), tau);
        }
    }

    #[test]
    fn test_hard_update() {
        type B = NdArray;
        let mut a = LinearPolicy::<B>::new(3, 4, &Default::default());
        let b = LinearPolicy::<B>::new(3, 4, &Default::default());

        a.update(&b, None);

        let diff: f32 = (a.layer.weight.val() - b.layer.weight.val())
            .abs()
            .sum()
            .into_scalar();
        assert!(diff < 1e-6);
    }

    #[test]
    fn test_soft_update() {
        type B = NdArray;
        let mut a = LinearPolicy::<B>::new(3, 4, &Default::default());
        let b = LinearPolicy::<B>::new(3, 4, &Default::default());

        a.update(&b, Some(0.05));
    }

    #[should_panic]
    #[test]
    fn test_soft_update_bad() {
        type B = NdArray;
        let mut a = LinearPolicy::<B>::new(3, 4, &Default::default());
        let b = LinearPolicy::<B>::new(4, 4, &Default::default());

        a.update(&b, Some(0.05));
    }

    #[should_panic]
    #[test]
    fn test_hard_update_bad() {
        type B = NdArray;
        let mut a = LinearPolicy::<B>::new(3, 4, &Default::default());
        let b = LinearPolicy::<B>::new(4, 4, &Default::default());

        a.update(&b, None);
    }

    #[test]
    fn test_soft_update_value() {
        type B = NdArray;
        let from = Param::from_tensor(Tensor::from_floats([1.0], &Default::default()));
        let to = Param::from_tensor(Tensor::from_floats([0.0], &Default::default()));
        let tau = 0.05;

        let new_to: Param<Tensor<B, 1, Float>> = soft_update_tensor(&from, to, tau);

        let new_to_f: f32 = new_to.val().into_scalar();

        let diff = (tau - new_to_f).abs();

        assert!(
            diff < 1e-6,
            "tau update value gave unexpected result. Gave {new_to_f}, expected {tau}"
        );
    }
}
